// mongo-blob-backup/src/config/credentials.rs
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{AppError, Result};

pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

/// Storage account name and key, each possibly unresolved.
///
/// Missing values are not an error here; they surface as
/// [`AppError::MissingCredentials`] when a storage call needs them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub account: Option<String>,
    pub key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Returns `(account, key)`, failing if either half is missing.
    pub fn require(&self) -> Result<(&str, &str)> {
        let account = self
            .account
            .as_deref()
            .ok_or(AppError::MissingCredentials("account name"))?;
        let key = self
            .key
            .as_deref()
            .ok_or(AppError::MissingCredentials("account key"))?;
        Ok((account, key))
    }
}

/// Shape of the JSON credentials file: `{"account": "...", "key": "..."}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileCredentials {
    pub account: Option<String>,
    pub key: Option<String>,
}

/// Reads the credentials file. An absent, unreadable or malformed file yields `None`.
pub fn read_credentials_file(path: &Path) -> Option<FileCredentials> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("No credentials file read from {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(creds) => Some(creds),
        Err(e) => {
            debug!("Ignoring malformed credentials file {}: {}", path.display(), e);
            None
        }
    }
}

/// Resolves credentials from the environment values first, then the file.
///
/// The file is only consulted when the environment lacks either half, and
/// then fills in whichever half is missing.
pub fn resolve_credentials(
    env_account: Option<String>,
    env_key: Option<String>,
    credentials_file: &Path,
) -> Credentials {
    if env_account.is_some() && env_key.is_some() {
        return Credentials {
            account: env_account,
            key: env_key,
        };
    }

    let file = read_credentials_file(credentials_file).unwrap_or_default();
    Credentials {
        account: env_account.or(file.account),
        key: env_key.or(file.key),
    }
}

/// `credentials.json` next to the running executable, or in the working
/// directory when the executable path is unknown.
pub fn default_credentials_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CREDENTIALS_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE))
}
