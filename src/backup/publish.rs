// mongo-blob-backup/src/backup/publish.rs
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::storage::BlobStore;

/// Uploads `archive` under its file name and removes the local copy.
///
/// The container is created first if needed. If the upload fails the archive
/// stays on disk so the dump is not lost.
pub async fn publish(config: &Config, store: &dyn BlobStore, archive: &Path) -> Result<String> {
    let blob_name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            AppError::Config(format!("Archive path has no file name: {}", archive.display()))
        })?;

    store
        .ensure_container(&config.container, config.public_container)
        .await?;

    if let Err(e) = store.upload(&config.container, &blob_name, archive).await {
        warn!("Upload failed; keeping local archive {}", archive.display());
        return Err(e);
    }
    info!("✓ Uploaded {} to container {}", blob_name, config.container);

    tokio::fs::remove_file(archive).await?;
    Ok(blob_name)
}
