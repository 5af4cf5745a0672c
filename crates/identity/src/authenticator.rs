//! Login exchange plus session registration
//!
//! A successful exchange always succeeds for the caller, even when the token
//! could not be registered. That degraded outcome is returned explicitly as
//! `Registration::Failed` so the caller can log and count it: the client holds
//! a token that will not authorize until it logs in again.

use std::sync::Arc;

use session_store::{SESSION_TTL, TokenStore, fingerprint};
use tracing::{info, instrument, warn};

use crate::client::{AuthResponse, IdentityClient};
use crate::error::Result;
use crate::login::LoginPair;

/// What happened to the token after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// The payload had no string `access_token`; nothing to register.
    MissingToken,
    /// The token store rejected the write.
    Failed(String),
}

impl Registration {
    /// Label used for metrics and logs. `None` when registration succeeded.
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            Registration::Registered => None,
            Registration::MissingToken => Some("missing_token"),
            Registration::Failed(_) => Some("store_error"),
        }
    }
}

/// Outcome of a successful login.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub response: AuthResponse,
    pub registration: Registration,
}

/// Upstream authenticator: identity provider exchange + token registration.
pub struct Authenticator {
    client: IdentityClient,
    store: Arc<dyn TokenStore>,
}

impl Authenticator {
    pub fn new(client: IdentityClient, store: Arc<dyn TokenStore>) -> Self {
        Self { client, store }
    }

    /// Exchange credentials and register the returned token for `SESSION_TTL`.
    ///
    /// Errors only when the exchange itself fails; see `Registration` for the
    /// registration outcome.
    #[instrument(skip_all, fields(email = %pair.email))]
    pub async fn authenticate(&self, pair: &LoginPair) -> Result<Authenticated> {
        let response = self.client.login(pair).await?;

        let registration = match response.access_token() {
            None => {
                warn!("identity provider payload has no access_token, no session registered");
                Registration::MissingToken
            }
            Some(token) => match self.store.register(token, SESSION_TTL).await {
                Ok(()) => {
                    info!(token = fingerprint(token), backend = self.store.backend(), "session registered");
                    Registration::Registered
                }
                Err(e) => {
                    warn!(
                        token = fingerprint(token),
                        backend = self.store.backend(),
                        error = %e,
                        "unable to register session; token will be rejected until the client logs in again"
                    );
                    Registration::Failed(e.to_string())
                }
            },
        };

        Ok(Authenticated {
            response,
            registration,
        })
    }
}
