//! Error types for identity provider exchanges

/// Errors from the login exchange.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identity provider rejected the credentials (HTTP 401).
    #[error("identity provider rejected the credentials")]
    Unauthorized,

    /// Any other non-2xx answer, carried through with its status and body.
    #[error("identity provider returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("identity provider unreachable: {0}")]
    Unreachable(String),

    #[error("identity provider did not answer within {0}s")]
    Timeout(u64),

    #[error("invalid login request: {0}")]
    InvalidRequest(String),
}

/// Result alias for identity operations.
pub type Result<T> = std::result::Result<T, Error>;
