use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::store::{ClusterDefinitions, Store};
use crate::{Error, Result};

pub const DEFINITIONS_FILE: &str = "definitions.json";

/// `definitions.json` in the agent's cache directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(DEFINITIONS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Store for FileStore {
    async fn load(&self) -> Result<Vec<ClusterDefinitions>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let document: Vec<ClusterDefinitions> = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Store(format!("{} is not a definitions document: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), clusters = document.len(), "loaded definitions");
        Ok(document)
    }

    async fn save(&self, document: &[ClusterDefinitions]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let bytes = serde_json::to_vec_pretty(document)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut staging = NamedTempFile::new_in(&dir)?;
            staging.write_all(&bytes)?;
            staging.as_file().sync_all()?;
            staging.persist(&path).map_err(|e| {
                Error::Store(format!("unable to replace {}: {}", path.display(), e.error))
            })?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(format!("definitions write did not complete: {}", e)))??;

        info!(path = %self.path.display(), clusters = document.len(), "saved definitions");
        Ok(())
    }
}
