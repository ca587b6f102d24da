// mongo-blob-backup/src/restore/db_restore.rs
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::errors::Result;
use crate::utils::{find_executable, run_tool};

const MONGORESTORE: &str = "mongorestore";

pub fn restore_args(config: &Config, archive: &Path) -> Vec<String> {
    vec![
        "--host".to_string(),
        config.mongo.host.clone(),
        "--db".to_string(),
        config.mongo.db.clone(),
        "--collection".to_string(),
        config.collection.clone(),
        "--gzip".to_string(),
        format!("--archive={}", archive.display()),
    ]
}

/// Feeds one gzip archive to mongorestore for the configured collection.
pub async fn restore_archive(config: &Config, archive: &Path) -> Result<()> {
    let mongorestore = find_executable(config.mongorestore_path.as_deref(), MONGORESTORE)?;
    run_tool(
        MONGORESTORE,
        &mongorestore,
        &restore_args(config, archive),
        None,
    )
    .await?;
    info!(
        "✓ Restored {} into {}.{}",
        archive.display(),
        config.mongo.db,
        config.collection
    );
    Ok(())
}
