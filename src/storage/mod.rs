// mongo-blob-backup/src/storage/mod.rs
pub mod azure;
pub mod s3;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use std::path::Path;

use crate::config::{Config, StorageBackend};
use crate::errors::Result;

pub use azure::AzureBlobStore;
pub use s3::S3BlobStore;

/// A named object in a storage container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub name: String,
    pub size: Option<u64>,
}

/// The blob-storage operations the dump and restore flows rely on.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Creates `container` unless it already exists. An existing container is left untouched.
    async fn ensure_container(&self, container: &str, public_read: bool) -> Result<()>;

    /// Uploads the file at `source` as `blob_name`, replacing any existing blob.
    async fn upload(&self, container: &str, blob_name: &str, source: &Path) -> Result<()>;

    /// Every blob in `container`, in the service's listing order.
    async fn list(&self, container: &str) -> Result<Vec<BlobEntry>>;

    /// Writes `blob_name` to `destination`.
    async fn download(&self, container: &str, blob_name: &str, destination: &Path) -> Result<()>;
}

/// Picks the storage backend named by the config.
///
/// Credentials are not checked here; a missing account or key fails the
/// first storage call instead.
pub fn store_from_config(config: &Config) -> Box<dyn BlobStore> {
    match config.storage_backend {
        StorageBackend::Azure => Box::new(AzureBlobStore::new(
            config.credentials.clone(),
            config.azure_endpoint.clone(),
        )),
        StorageBackend::S3 => Box::new(S3BlobStore::new(
            config.credentials.clone(),
            config.s3_endpoint.clone(),
            config.s3_region.clone(),
        )),
    }
}
