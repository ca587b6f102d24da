pub mod candidates;
pub mod db_restore;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::storage::BlobStore;
pub use candidates::list_dump_candidates;
pub use db_restore::restore_archive;

/// Restores every dump archive found in the configured container.
///
/// Archives are handled one at a time in listing order. Each download goes
/// to its own temp file, which is removed whether or not the restore worked.
/// The first failure stops the run. Returns how many archives were restored.
pub async fn run_restore_flow(config: &Config, store: &dyn BlobStore) -> Result<usize> {
    let candidates = list_dump_candidates(config, store)
        .await
        .with_context(|| format!("Failed to list container {}", config.container))?;

    let mut restored = 0;
    for blob in candidates {
        match blob.size {
            Some(size) => info!("Restoring from blob: {} ({} bytes)", blob.name, size),
            None => info!("Restoring from blob: {}", blob.name),
        }

        let temp = tempfile::Builder::new()
            .suffix(".gz")
            .tempfile()
            .context("Failed to create temporary archive file")?;

        store
            .download(&config.container, &blob.name, temp.path())
            .await
            .with_context(|| format!("Failed to download {}", blob.name))?;

        restore_archive(config, temp.path())
            .await
            .with_context(|| format!("Failed to restore {}", blob.name))?;

        temp.close()
            .with_context(|| format!("Failed to remove temporary copy of {}", blob.name))?;
        restored += 1;
    }

    info!(
        "✅ Restored {} archive(s) from {}",
        restored, config.container
    );
    Ok(restored)
}
