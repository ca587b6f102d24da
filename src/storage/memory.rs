// In-memory BlobStore used by the flow tests.
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

use super::{BlobEntry, BlobStore};
use crate::errors::{AppError, Result};

#[derive(Debug, Default)]
struct Container {
    public_read: bool,
    blobs: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: Mutex<Vec<(String, Container)>>,
    fail_uploads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose uploads always fail.
    pub fn failing_uploads() -> Self {
        MemoryStore {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn with_blob(self, container: &str, name: &str, data: &[u8]) -> Self {
        {
            let mut containers = self.containers.lock().unwrap();
            let idx = index_of(&mut containers, container);
            containers[idx].1.blobs.push((name.to_string(), data.to_vec()));
        }
        self
    }

    pub fn blob_names(&self, container: &str) -> Vec<String> {
        let containers = self.containers.lock().unwrap();
        containers
            .iter()
            .find(|(name, _)| name == container)
            .map(|(_, c)| c.blobs.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    pub fn blob(&self, container: &str, name: &str) -> Option<Vec<u8>> {
        let containers = self.containers.lock().unwrap();
        containers
            .iter()
            .find(|(c, _)| c == container)
            .and_then(|(_, c)| c.blobs.iter().find(|(n, _)| n == name))
            .map(|(_, data)| data.clone())
    }

    pub fn is_public(&self, container: &str) -> Option<bool> {
        let containers = self.containers.lock().unwrap();
        containers
            .iter()
            .find(|(name, _)| name == container)
            .map(|(_, c)| c.public_read)
    }
}

fn index_of(containers: &mut Vec<(String, Container)>, name: &str) -> usize {
    match containers.iter().position(|(n, _)| n == name) {
        Some(idx) => idx,
        None => {
            containers.push((name.to_string(), Container::default()));
            containers.len() - 1
        }
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn ensure_container(&self, container: &str, public_read: bool) -> Result<()> {
        let mut containers = self.containers.lock().unwrap();
        if !containers.iter().any(|(n, _)| n == container) {
            containers.push((
                container.to_string(),
                Container {
                    public_read,
                    blobs: Vec::new(),
                },
            ));
        }
        Ok(())
    }

    async fn upload(&self, container: &str, blob_name: &str, source: &Path) -> Result<()> {
        if self.fail_uploads {
            return Err(AppError::Storage("upload rejected".to_string()));
        }
        let data = std::fs::read(source)?;
        let mut containers = self.containers.lock().unwrap();
        let idx = containers
            .iter()
            .position(|(n, _)| n == container)
            .ok_or_else(|| AppError::Storage(format!("container {} does not exist", container)))?;
        let blobs = &mut containers[idx].1.blobs;
        blobs.retain(|(n, _)| n != blob_name);
        blobs.push((blob_name.to_string(), data));
        Ok(())
    }

    async fn list(&self, container: &str) -> Result<Vec<BlobEntry>> {
        let containers = self.containers.lock().unwrap();
        let (_, c) = containers
            .iter()
            .find(|(n, _)| n == container)
            .ok_or_else(|| AppError::Storage(format!("container {} does not exist", container)))?;
        Ok(c.blobs
            .iter()
            .map(|(name, data)| BlobEntry {
                name: name.clone(),
                size: Some(data.len() as u64),
            })
            .collect())
    }

    async fn download(&self, container: &str, blob_name: &str, destination: &Path) -> Result<()> {
        let data = self
            .blob(container, blob_name)
            .ok_or_else(|| AppError::Storage(format!("blob {} not found", blob_name)))?;
        std::fs::write(destination, data)?;
        Ok(())
    }
}
