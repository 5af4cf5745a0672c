//! Error types for token store operations

/// Errors from token store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session store command failed: {0}")]
    Command(String),
}

/// Result alias for token store operations.
pub type Result<T> = std::result::Result<T, Error>;
