//! Blob store configuration types.
//!
//! Services pick the backing object store (in-memory, local filesystem or S3)
//! via config files or CLI/environment overrides.

use serde::{Deserialize, Serialize};

/// Top-level blob store configuration.
///
/// Defaults to a local `.data` directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BlobStoreConfig {
    /// In-memory object store (useful for testing and development).
    InMemory,

    /// AWS S3 object store.
    Aws(AwsBlobStoreConfig),

    /// Local filesystem object store.
    Local(LocalBlobStoreConfig),
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        BlobStoreConfig::Local(LocalBlobStoreConfig {
            path: ".data".to_string(),
        })
    }
}

impl BlobStoreConfig {
    /// Returns an S3 configuration for `bucket`, keeping the region of an
    /// existing S3 config when no region is given.
    pub fn with_bucket(&self, bucket: String, region: Option<String>) -> Self {
        let region = region
            .or_else(|| match self {
                BlobStoreConfig::Aws(aws) => Some(aws.region.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "us-east-1".to_string());
        BlobStoreConfig::Aws(AwsBlobStoreConfig { region, bucket })
    }
}

/// AWS S3 configuration.
///
/// Credentials are resolved from the environment by `object_store`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AwsBlobStoreConfig {
    /// AWS region (e.g., "us-west-2").
    pub region: String,

    /// S3 bucket name.
    pub bucket: String,
}

/// Local filesystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalBlobStoreConfig {
    /// Path to the local directory for storage.
    pub path: String,
}
