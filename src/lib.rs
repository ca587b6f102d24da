//! Monthly MongoDB dumps published to blob storage, and restores from them.
//!
//! `post-blob` dumps the current month of a collection with `mongodump` and
//! uploads the archive; `import-blob` finds archives in the container and
//! feeds each one to `mongorestore`.

pub mod backup;
pub mod config;
pub mod errors;
pub mod logging;
pub mod restore;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use errors::{AppError, Result};

#[cfg(test)]
pub(crate) mod test_support;
