pub mod db_dump;
pub mod publish;
pub mod window;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::storage::BlobStore;
pub use db_dump::produce_dump;
pub use publish::publish;
pub use window::DumpWindow;

/// Dumps `window` of the configured collection and publishes the archive.
///
/// Nothing is uploaded if the dump fails or times out. Returns the blob name.
pub async fn run_backup_flow(
    config: &Config,
    window: &DumpWindow,
    store: &dyn BlobStore,
) -> Result<String> {
    let archive = produce_dump(config, window)
        .await
        .context("Failed to dump collection")?;

    let blob_name = publish(config, store, &archive)
        .await
        .with_context(|| format!("Failed to publish {}", archive.display()))?;

    info!("✅ Published {} to {}", blob_name, config.container);
    Ok(blob_name)
}
