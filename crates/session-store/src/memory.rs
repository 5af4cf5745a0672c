//! In-process token store
//!
//! Keeps one deadline per token behind a tokio Mutex. Expiry is lazy: every
//! operation treats an entry whose deadline has passed as absent, so a token
//! can never validate past its ttl even if the sweeper has not run yet.
//! Deadlines use `tokio::time::Instant` so tests can drive the clock.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{StoreFuture, TokenStore, fingerprint};

#[derive(Debug, Clone, Copy)]
struct Entry {
    deadline: Instant,
    /// Set by `expire_now`; the entry still validates until `deadline` but
    /// renewals are ignored.
    logged_out: bool,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline > now
    }
}

/// Token store backed by a process-local map.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens that are currently valid.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    async fn insert(&self, token: &str, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            token.to_owned(),
            Entry {
                deadline: Instant::now() + ttl,
                logged_out: false,
            },
        );
        debug!(token = fingerprint(token), ttl_secs = ttl.as_secs(), "registered session");
    }

    async fn contains(&self, token: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(token) {
            Some(entry) if entry.is_live(now) => true,
            Some(_) => {
                entries.remove(token);
                false
            }
            None => false,
        }
    }

    async fn touch(&self, token: &str, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(token) {
            Some(entry) if entry.is_live(now) => {
                if !entry.logged_out {
                    entry.deadline = now + ttl;
                }
            }
            Some(_) => {
                entries.remove(token);
            }
            None => {}
        }
    }

    async fn shorten(&self, token: &str, grace: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(token) {
            Some(entry) if entry.is_live(now) => {
                entry.deadline = now + grace;
                entry.logged_out = true;
                debug!(token = fingerprint(token), grace_secs = grace.as_secs(), "session expiring");
            }
            Some(_) => {
                entries.remove(token);
            }
            None => {}
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn backend(&self) -> &str {
        "memory"
    }

    fn register<'a>(&'a self, token: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.insert(token, ttl).await;
            Ok(())
        })
    }

    fn exists<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.contains(token).await) })
    }

    fn renew<'a>(&'a self, token: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.touch(token, ttl).await;
            Ok(())
        })
    }

    fn expire_now<'a>(&'a self, token: &'a str, grace: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.shorten(token, grace).await;
            Ok(())
        })
    }
}
