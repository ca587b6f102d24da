// mongo-blob-backup/src/config/mod.rs
pub mod credentials;

use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{AppError, Result};
pub use credentials::Credentials;

pub const DEFAULT_MONGO_HOST: &str = "localhost";
pub const DEFAULT_MONGO_DB: &str = "mbta";
pub const DEFAULT_COLLECTION: &str = "trip-stops";
pub const DEFAULT_CONTAINER: &str = "mbtafyi";
pub const DEFAULT_S3_REGION: &str = "us-east-1";
/// Wall-clock budget for a single mongodump run (100 minutes).
pub const DUMP_TIMEOUT: Duration = Duration::from_secs(6000);

static MONGO_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^mongodb://([^/]+)/(\w+)").expect("static regex is valid")
});

/// Host and database the Mongo tools are pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoTarget {
    pub host: String,
    pub db: String,
}

impl Default for MongoTarget {
    fn default() -> Self {
        MongoTarget {
            host: DEFAULT_MONGO_HOST.to_string(),
            db: DEFAULT_MONGO_DB.to_string(),
        }
    }
}

impl MongoTarget {
    /// Parses `mongodb://<host>/<db>`. Anything after the database name is ignored.
    pub fn parse_uri(uri: &str) -> Result<Self> {
        let caps = MONGO_URI_RE.captures(uri).ok_or_else(|| {
            AppError::Config(format!(
                "MONGO_URI must look like mongodb://<host>/<db>, got '{}'",
                uri
            ))
        })?;
        Ok(MongoTarget {
            host: caps[1].to_string(),
            db: caps[2].to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Azure,
    S3,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(StorageBackend::Azure),
            "s3" => Ok(StorageBackend::S3),
            other => Err(AppError::Config(format!(
                "STORAGE_BACKEND must be 'azure' or 's3', got '{}'",
                other
            ))),
        }
    }
}

/// Everything a dump or restore run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub mongo: MongoTarget,
    pub collection: String,
    pub container: String,
    pub credentials: Credentials,
    pub storage_backend: StorageBackend,
    pub azure_endpoint: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub dump_dir: PathBuf,
    pub mongodump_path: Option<PathBuf>,
    pub mongorestore_path: Option<PathBuf>,
    pub dump_timeout: Duration,
    /// Create a missing container with public read access on its blobs and listing.
    pub public_container: bool,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from a key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mongo = match get("MONGO_URI") {
            Some(uri) => MongoTarget::parse_uri(&uri)?,
            None => MongoTarget::default(),
        };

        let credentials_file = get("AZURE_CREDENTIALS")
            .map(PathBuf::from)
            .unwrap_or_else(credentials::default_credentials_path);
        let credentials = credentials::resolve_credentials(
            get("AZURE_ACCOUNT"),
            get("AZURE_KEY"),
            &credentials_file,
        );

        let storage_backend = match get("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::default(),
        };

        Ok(Config {
            mongo,
            collection: get("MONGO_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            container: get("AZURE_BUCKET").unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            credentials,
            storage_backend,
            azure_endpoint: get("AZURE_ENDPOINT"),
            s3_endpoint: get("S3_ENDPOINT"),
            s3_region: get("S3_REGION").unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            dump_dir: get("DUMP_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            mongodump_path: get("MONGODUMP_PATH").map(PathBuf::from),
            mongorestore_path: get("MONGORESTORE_PATH").map(PathBuf::from),
            dump_timeout: DUMP_TIMEOUT,
            public_container: true,
        })
    }
}
