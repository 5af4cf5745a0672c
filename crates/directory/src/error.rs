//! Error types for directory lookups

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("datastore connection failed: {0}")]
    Connect(String),

    #[error("datastore query failed: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, Error>;
