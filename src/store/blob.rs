use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::BlobError;

use super::BlobStore;

/// Blobs as files under `root`, reachable at `base_url/<path>`.
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn file_path(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !plain {
            return Err(BlobError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), BlobError> {
        let file = self.file_path(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, bytes).await?;
        debug!(path, content_type, len = bytes.len(), "blob stored");
        Ok(())
    }

    async fn resolve_url(&self, path: &str) -> Result<String, BlobError> {
        let file = self.file_path(path)?;
        if !tokio::fs::try_exists(&file).await? {
            return Err(BlobError::Missing(path.to_owned()));
        }
        Ok(format!("{}/{path}", self.base_url))
    }
}
