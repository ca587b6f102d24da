use std::time::Duration;
use thiserror::Error;

/// Exit status for a dump that ran past its time budget.
pub const EXIT_TIMEOUT: u8 = 1;
/// Exit status for every other failure.
pub const EXIT_FAILURE: u8 = 2;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tool} took more than {} minutes to run", .budget.as_secs() / 60)]
    Timeout { tool: String, budget: Duration },

    #[error("{tool} failed ({status}): {stderr}")]
    Command {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Missing storage credentials: no {0} found in environment or credentials file")]
    MissingCredentials(&'static str),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Maps a failed run onto the process exit status.
///
/// A dump timeout anywhere in the error chain exits with [`EXIT_TIMEOUT`];
/// anything else exits with [`EXIT_FAILURE`].
pub fn exit_status(err: &anyhow::Error) -> u8 {
    let timed_out = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<AppError>(),
            Some(AppError::Timeout { .. })
        )
    });
    if timed_out { EXIT_TIMEOUT } else { EXIT_FAILURE }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_timeout_maps_to_exit_one_through_context() {
        let err: anyhow::Error = Err::<(), _>(AppError::Timeout {
            tool: "mongodump".to_string(),
            budget: Duration::from_secs(6000),
        })
        .context("Dump failed")
        .unwrap_err();

        assert_eq!(exit_status(&err), EXIT_TIMEOUT);
        assert!(format!("{:#}", err).contains("mongodump took more than 100 minutes"));
    }

    #[test]
    fn test_other_failures_map_to_generic_exit() {
        let err = anyhow::Error::new(AppError::Command {
            tool: "mongorestore".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "boom".to_string(),
        });
        assert_eq!(exit_status(&err), EXIT_FAILURE);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_status(&err), EXIT_FAILURE);
    }
}
