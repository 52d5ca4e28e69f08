//! Blob storage abstraction.
//!
//! Segments, checkpoints and registry records are all persisted as whole
//! objects addressed by a `/`-separated key. The [`BlobStore`] trait captures
//! the four operations the services rely on; there are no ordering guarantees
//! beyond per-key consistency, so callers that need ordering (the replay
//! listing) sort the keys themselves.

pub mod config;
pub mod factory;
pub mod object;

use async_trait::async_trait;
use bytes::Bytes;

/// Error type for blob storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    /// The backend rejected or failed the request.
    #[error("storage error: {0}")]
    Storage(String),
    /// The key is not a valid object path.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BlobError {
    /// Wraps any backend error as [`BlobError::Storage`].
    pub fn from_storage(e: impl std::fmt::Display) -> Self {
        BlobError::Storage(e.to_string())
    }
}

/// Result type alias for blob storage operations.
pub type BlobResult<T> = std::result::Result<T, BlobError>;

/// Durable key-addressed blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Lists every key under `prefix`.
    ///
    /// The prefix is matched on whole path segments: `orders` matches
    /// `orders/2024-01-01/x.dat` but not `orders2/...`. The returned order is
    /// unspecified.
    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>>;

    /// Reads a whole object. Returns `None` if the key does not exist.
    async fn get(&self, key: &str) -> BlobResult<Option<Bytes>>;

    /// Writes a whole object, replacing any previous value.
    async fn put(&self, key: &str, value: Bytes) -> BlobResult<()>;

    /// Deletes an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> BlobResult<()>;
}
