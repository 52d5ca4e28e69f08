//! Error types for the routing tier.

/// Error type for balancer operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The instance source could not be initialised.
    #[error("membership source error: {0}")]
    Source(String),

    /// Listing instances failed.
    #[error("membership listing failed: {0}")]
    Listing(String),

    /// Configuration could not be read.
    #[error("config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Listing(err.to_string())
    }
}

/// Result type alias for balancer operations.
pub type Result<T> = std::result::Result<T, Error>;
