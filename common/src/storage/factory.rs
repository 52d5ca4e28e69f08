//! Blob store factory.
//!
//! Builds a [`BlobStore`] from a [`BlobStoreConfig`].

use std::sync::Arc;

use object_store::ObjectStore;

use super::config::BlobStoreConfig;
use super::object::ObjectBlobStore;
use super::{BlobError, BlobResult, BlobStore};

/// Creates a blob store based on the provided configuration.
///
/// # Examples
///
/// ```rust,ignore
/// use common::storage::config::BlobStoreConfig;
/// use common::storage::factory::create_blob_store;
///
/// let store = create_blob_store(&BlobStoreConfig::InMemory)?;
/// ```
pub fn create_blob_store(config: &BlobStoreConfig) -> BlobResult<Arc<dyn BlobStore>> {
    let object_store: Arc<dyn ObjectStore> = match config {
        BlobStoreConfig::InMemory => Arc::new(object_store::memory::InMemory::new()),
        BlobStoreConfig::Aws(aws_config) => {
            let store = object_store::aws::AmazonS3Builder::from_env()
                .with_region(&aws_config.region)
                .with_bucket_name(&aws_config.bucket)
                .build()
                .map_err(|e| BlobError::Storage(format!("Failed to create AWS S3 store: {}", e)))?;
            Arc::new(store)
        }
        BlobStoreConfig::Local(local_config) => {
            std::fs::create_dir_all(&local_config.path).map_err(|e| {
                BlobError::Storage(format!(
                    "Failed to create storage directory '{}': {}",
                    local_config.path, e
                ))
            })?;
            let store = object_store::local::LocalFileSystem::new_with_prefix(&local_config.path)
                .map_err(|e| {
                    BlobError::Storage(format!("Failed to create local filesystem store: {}", e))
                })?;
            Arc::new(store)
        }
    };

    Ok(Arc::new(ObjectBlobStore::new(object_store)))
}
