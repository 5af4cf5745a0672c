//! Session token store
//!
//! Maps opaque bearer tokens issued by the identity provider to a live,
//! renewable session. A token is either absent (never issued, expired, or
//! past its logout grace window) or present with a positive remaining ttl.
//!
//! Session lifecycle:
//! 1. Successful login → `register(token, SESSION_TTL)`
//! 2. Every authorized request → `exists(token)` then `renew(token, SESSION_TTL)`
//! 3. Logout → `expire_now(token, LOGOUT_GRACE)`; the token keeps validating
//!    for the grace window but can no longer be renewed
//! 4. Inactivity for `SESSION_TTL` → entry expires
//!
//! Two backends implement [`TokenStore`]: [`MemoryTokenStore`] for a single
//! process and [`RedisTokenStore`] for a shared cache.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod sweeper;

pub use error::{Error, Result};
pub use memory::MemoryTokenStore;
pub use redis_store::RedisTokenStore;
pub use sweeper::spawn_sweeper;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Lifetime of a session between two authorized requests.
pub const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// How long a logged-out token keeps validating, so duplicate in-flight
/// requests racing the logout still succeed.
pub const LOGOUT_GRACE: Duration = Duration::from_secs(3);

/// Value stored against a live token.
pub const SESSION_MARKER: &str = "True";

/// Value stored against a token inside its logout grace window.
pub const LOGOUT_MARKER: &str = "Logout";

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Keyed expiring-entry cache holding session validity.
///
/// Implementations must be safe for concurrent use: every request handler
/// shares one store and each operation is atomic with respect to the others.
/// Uses `Pin<Box<dyn Future>>` return types so the gateway can hold an
/// `Arc<dyn TokenStore>`.
pub trait TokenStore: Send + Sync {
    /// Backend identifier for logging and the health endpoint.
    fn backend(&self) -> &str;

    /// Store `token` with a live marker and the given ttl, overwriting any
    /// previous entry.
    fn register<'a>(&'a self, token: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

    /// Whether `token` is present and not yet expired.
    fn exists<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool>;

    /// Reset the remaining ttl of a live token. No-op when the token is absent
    /// or already inside its logout grace window.
    fn renew<'a>(&'a self, token: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

    /// Shorten the remaining ttl of a present token to `grace` and stop any
    /// further renewal. No-op when the token is absent.
    fn expire_now<'a>(&'a self, token: &'a str, grace: Duration) -> StoreFuture<'a, ()>;
}

/// Short, log-safe prefix of a token.
pub fn fingerprint(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(6)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}
