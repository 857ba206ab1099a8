use std::path::PathBuf;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use cove_types::error::{StoreError, StoreResult};
use cove_types::remote::ObjectStorage;

/// Directory-backed object store. Blobs land at `{root}/{path}` and are
/// addressed back as `file://` URLs, standing in for a public bucket.
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub async fn new(root: PathBuf) -> StoreResult<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;
        info!("Object storage directory: {}", root.display());
        Ok(Self { root })
    }
}

#[async_trait]
impl ObjectStorage for DirStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> StoreResult<String> {
        // Keep uploads inside the storage root
        if path.contains("..") || path.starts_with('/') {
            return Err(StoreError::validation(format!("invalid object path: {path}")));
        }

        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Transport(e.into()))?;
        }
        fs::write(&target, bytes)
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        let absolute = target
            .canonicalize()
            .map_err(|e| StoreError::Transport(anyhow!("canonicalize {}: {e}", target.display())))?;
        Ok(format!("file://{}", absolute.display()))
    }
}
