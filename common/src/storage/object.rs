use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};

use super::{BlobError, BlobResult, BlobStore};

/// [`BlobStore`] backed by an [`object_store::ObjectStore`].
///
/// Works with every provider `object_store` supports; the factory wires up
/// S3, the local filesystem and the in-memory store.
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Creates a store backed by `object_store`'s in-memory implementation.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()))
    }

    fn path(key: &str) -> BlobResult<Path> {
        Path::parse(key).map_err(|e| BlobError::InvalidKey(format!("{}: {}", key, e)))
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    #[tracing::instrument(level = "trace", skip(self))]
    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
        let prefix = Self::path(prefix.trim_end_matches('/'))?;
        let metas: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(BlobError::from_storage)?;
        Ok(metas.into_iter().map(|m| m.location.to_string()).collect())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get(&self, key: &str) -> BlobResult<Option<Bytes>> {
        let path = Self::path(key)?;
        match self.store.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await.map_err(BlobError::from_storage)?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(BlobError::from_storage(e)),
        }
    }

    #[tracing::instrument(level = "trace", skip(self, value), fields(len = value.len()))]
    async fn put(&self, key: &str, value: Bytes) -> BlobResult<()> {
        let path = Self::path(key)?;
        self.store
            .put(&path, PutPayload::from(value))
            .await
            .map_err(BlobError::from_storage)?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn delete(&self, key: &str) -> BlobResult<()> {
        let path = Self::path(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(BlobError::from_storage(e)),
        }
    }
}
