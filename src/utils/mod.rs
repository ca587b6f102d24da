// mongo-blob-backup/src/utils/mod.rs
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;
use which::which;

use crate::errors::{AppError, Result};

/// Uses the configured path for `tool` if there is one, otherwise looks it up on `PATH`.
pub fn find_executable(configured: Option<&Path>, tool: &str) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    which(tool).map_err(|e| AppError::Command {
        tool: tool.to_string(),
        status: "not started".to_string(),
        stderr: format!(
            "{} executable not found in PATH ({}). Please ensure the MongoDB database tools are installed.",
            tool, e
        ),
    })
}

/// Runs `program` to completion, capturing its output.
///
/// With a `budget`, the child is killed once the budget runs out and
/// [`AppError::Timeout`] is returned. A non-zero exit becomes [`AppError::Command`].
pub async fn run_tool(
    tool: &str,
    program: &Path,
    args: &[String],
    budget: Option<Duration>,
) -> Result<Output> {
    debug!("Running {} {}", program.display(), args.join(" "));

    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);

    let output = match budget {
        Some(budget) => match timeout(budget, command.output()).await {
            Ok(result) => result,
            Err(_) => {
                return Err(AppError::Timeout {
                    tool: tool.to_string(),
                    budget,
                });
            }
        },
        None => command.output().await,
    }
    .map_err(|e| AppError::Command {
        tool: tool.to_string(),
        status: "not started".to_string(),
        stderr: format!("failed to execute {}: {}", program.display(), e),
    })?;

    if !output.status.success() {
        return Err(AppError::Command {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}
