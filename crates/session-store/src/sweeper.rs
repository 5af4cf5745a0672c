//! Periodic removal of expired in-memory sessions
//!
//! Expired entries already read as absent; the sweeper only reclaims their
//! memory. Redis expires keys natively and needs no sweeper.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::memory::MemoryTokenStore;

/// Spawn a background task that purges expired entries every `interval`.
pub fn spawn_sweeper(
    store: Arc<MemoryTokenStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick, the store starts empty
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = store.purge_expired().await;
            if removed > 0 {
                debug!(removed, "purged expired sessions");
            }
        }
    })
}
