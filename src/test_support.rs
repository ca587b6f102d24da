// Shared fixtures for unit tests.
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, Credentials, DUMP_TIMEOUT, MongoTarget, StorageBackend};

/// Writes an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> anyhow::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// A config that dumps into `dir` and never reads real credentials.
pub fn test_config(dir: &Path) -> Config {
    Config {
        mongo: MongoTarget::default(),
        collection: "trip-stops".to_string(),
        container: "mbtafyi".to_string(),
        credentials: Credentials {
            account: Some("testaccount".to_string()),
            key: Some("dGVzdGtleQ==".to_string()),
        },
        storage_backend: StorageBackend::Azure,
        azure_endpoint: None,
        s3_endpoint: None,
        s3_region: "us-east-1".to_string(),
        dump_dir: dir.to_path_buf(),
        mongodump_path: None,
        mongorestore_path: None,
        dump_timeout: DUMP_TIMEOUT,
        public_container: true,
    }
}
