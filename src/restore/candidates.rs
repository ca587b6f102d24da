// mongo-blob-backup/src/restore/candidates.rs
use regex::Regex;

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::storage::{BlobEntry, BlobStore};

/// `^<collection>_<digits>_<digits>\.gz$`, with the collection name taken literally.
pub fn candidate_pattern(collection: &str) -> Result<Regex> {
    let pattern = format!(r"^{}_\d+_\d+\.gz$", regex::escape(collection));
    Regex::new(&pattern)
        .map_err(|e| AppError::Config(format!("Invalid archive pattern {}: {}", pattern, e)))
}

/// Lazily filters one container listing down to dump archives.
pub struct DumpCandidates {
    blobs: std::vec::IntoIter<BlobEntry>,
    pattern: Regex,
}

impl Iterator for DumpCandidates {
    type Item = BlobEntry;

    fn next(&mut self) -> Option<BlobEntry> {
        let pattern = &self.pattern;
        self.blobs.find(|blob| pattern.is_match(&blob.name))
    }
}

/// Blobs in the configured container that look like dump archives, in listing order.
///
/// Each call lists the container again.
pub async fn list_dump_candidates(config: &Config, store: &dyn BlobStore) -> Result<DumpCandidates> {
    let pattern = candidate_pattern(&config.collection)?;
    let blobs = store.list(&config.container).await?;
    Ok(DumpCandidates {
        blobs: blobs.into_iter(),
        pattern,
    })
}
