//! Error types for the broker.

use common::{BlobError, TopicError};

/// Error type for broker operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The topic name cannot be used as a file name or key component.
    #[error("invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),

    /// Local segment file I/O failed.
    #[error("segment I/O error: {0}")]
    Io(String),

    /// The blob store rejected or failed a request.
    #[error(transparent)]
    Storage(#[from] BlobError),

    /// A record could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The engine is shutting down and no longer accepts writes.
    #[error("broker is shutting down")]
    ShuttingDown,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, Error>;
