//! Dumps the current month of the collection and uploads it to blob storage.
use anyhow::{Context, Result};
use clap::Parser;
use mongo_blob_backup::backup::{DumpWindow, run_backup_flow};
use mongo_blob_backup::config::Config;
use mongo_blob_backup::errors::exit_status;
use mongo_blob_backup::logging::init_logger;
use mongo_blob_backup::storage::store_from_config;
use std::process::ExitCode;
use tracing::error;

#[derive(Debug, Parser)]
#[command(version, about = "Dump a MongoDB collection by month and publish it to blob storage")]
struct Cli {
    /// Start of the dump window in epoch seconds (default: start of the current UTC month)
    #[arg(long)]
    since: Option<i64>,

    /// End of the dump window in epoch seconds, exclusive (default: now)
    #[arg(long)]
    before: Option<i64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run_app(&cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run_app(cli: &Cli) -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let window = DumpWindow::new(cli.since, cli.before).context("Invalid dump window")?;
    let store = store_from_config(&config);
    run_backup_flow(&config, &window, store.as_ref()).await?;
    Ok(())
}
