// mongo-blob-backup/src/backup/db_dump.rs
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::window::DumpWindow;
use crate::config::Config;
use crate::errors::Result;
use crate::utils::{find_executable, run_tool};

const MONGODUMP: &str = "mongodump";

/// Arguments for a gzip archive dump of the configured collection over `window`.
pub fn dump_args(config: &Config, window: &DumpWindow, archive_path: &Path) -> Vec<String> {
    vec![
        "--host".to_string(),
        config.mongo.host.clone(),
        "--db".to_string(),
        config.mongo.db.clone(),
        "--collection".to_string(),
        config.collection.clone(),
        "--query".to_string(),
        window.query().to_string(),
        "--gzip".to_string(),
        format!("--archive={}", archive_path.display()),
    ]
}

/// Where the archive for `window` is written.
pub fn archive_path(config: &Config, window: &DumpWindow) -> PathBuf {
    config.dump_dir.join(window.archive_name(&config.collection))
}

/// Runs mongodump over `window` and returns the archive it wrote.
///
/// Fails with [`crate::AppError::Timeout`] once `config.dump_timeout` runs
/// out; whatever the tool had written by then is left in place.
pub async fn produce_dump(config: &Config, window: &DumpWindow) -> Result<PathBuf> {
    fs::create_dir_all(&config.dump_dir).await?;

    let mongodump = find_executable(config.mongodump_path.as_deref(), MONGODUMP)?;
    let archive = archive_path(config, window);
    let args = dump_args(config, window, &archive);

    info!(
        "Dumping {}.{} from {} since {}{} to {}",
        config.mongo.db,
        config.collection,
        config.mongo.host,
        window.since(),
        window
            .before()
            .map(|before| format!(" before {}", before))
            .unwrap_or_default(),
        archive.display()
    );

    run_tool(MONGODUMP, &mongodump, &args, Some(config.dump_timeout)).await?;

    info!("✓ Dump written to {}", archive.display());
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::test_support::test_config;
    use chrono::{TimeZone, Utc};

    fn march_window() -> DumpWindow {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap();
        DumpWindow::at(now, None, None).unwrap()
    }

    #[test]
    fn test_dump_args_for_default_window() {
        let dir = Path::new("/var/dumps");
        let config = test_config(dir);
        let window = march_window();

        let archive = archive_path(&config, &window);
        assert_eq!(archive, PathBuf::from("/var/dumps/trip-stops_2024_03.gz"));

        let args = dump_args(&config, &window, &archive);
        assert_eq!(
            args,
            vec![
                "--host",
                "localhost",
                "--db",
                "mbta",
                "--collection",
                "trip-stops",
                "--query",
                r#"{"arrival-time":{"$gte":1709251200}}"#,
                "--gzip",
                "--archive=/var/dumps/trip-stops_2024_03.gz",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_produce_dump_runs_tool_and_returns_archive() -> anyhow::Result<()> {
        use crate::test_support::fake_tool;

        let dir = tempfile::tempdir()?;
        let tool = fake_tool(
            dir.path(),
            "mongodump",
            r#"printf '%s\n' "$@" > "$(dirname "$0")/mongodump.args"
for arg in "$@"; do
  case "$arg" in
    --archive=*) printf 'archive' > "${arg#--archive=}" ;;
  esac
done"#,
        )?;
        let mut config = test_config(&dir.path().join("out"));
        config.mongodump_path = Some(tool);

        let archive = produce_dump(&config, &march_window()).await?;

        assert_eq!(archive, dir.path().join("out").join("trip-stops_2024_03.gz"));
        assert_eq!(std::fs::read_to_string(&archive)?, "archive");
        let recorded = std::fs::read_to_string(dir.path().join("mongodump.args"))?;
        assert!(recorded.contains(r#"{"arrival-time":{"$gte":1709251200}}"#));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_dump_is_a_command_error() -> anyhow::Result<()> {
        use crate::test_support::fake_tool;

        let dir = tempfile::tempdir()?;
        let tool = fake_tool(dir.path(), "mongodump", "echo 'auth failed' >&2\nexit 1")?;
        let mut config = test_config(dir.path());
        config.mongodump_path = Some(tool);

        let err = produce_dump(&config, &march_window()).await.unwrap_err();
        assert!(matches!(err, AppError::Command { ref stderr, .. } if stderr == "auth failed"));
        Ok(())
    }
}
