//! Error types for the replay tier.

use common::{BlobError, ProtocolError};

/// Error type for replay operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The blob store rejected or failed a request.
    #[error(transparent)]
    Storage(#[from] BlobError),

    /// A stored checkpoint could not be decoded.
    #[error("invalid checkpoint {key}: {message}")]
    InvalidCheckpoint { key: String, message: String },

    /// A client frame could not be parsed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A record could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Configuration could not be read.
    #[error("config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

/// Result type alias for replay operations.
pub type Result<T> = std::result::Result<T, Error>;
