//! Restores every monthly dump archive found in blob storage.
use anyhow::{Context, Result};
use clap::Parser;
use mongo_blob_backup::config::Config;
use mongo_blob_backup::errors::exit_status;
use mongo_blob_backup::logging::init_logger;
use mongo_blob_backup::restore::run_restore_flow;
use mongo_blob_backup::storage::store_from_config;
use std::process::ExitCode;
use tracing::error;

#[derive(Debug, Parser)]
#[command(version, about = "Restore monthly MongoDB dump archives from blob storage")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run_app().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run_app() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let store = store_from_config(&config);
    run_restore_flow(&config, store.as_ref()).await?;
    Ok(())
}
