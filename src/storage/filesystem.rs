//! Local filesystem blob store
//!
//! Blobs are laid out by the SHA-256 of their storage key:
//! `<root>/<first two hex chars>/<full hex digest>`. Hashing keeps keys that
//! are prefixes of one another (`a/b` and `a/b/c`) from needing a path to be
//! both a file and a directory.

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{not_found, BlobStore, StorageKey};
use crate::types::{AppError, AppResult};

pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: PathBuf) -> AppResult<Self> {
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &StorageKey) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_str().as_bytes()));
        self.root.join(&digest[..2]).join(digest)
    }
}

#[async_trait]
impl BlobStore for FilesystemStore {
    async fn put(&self, key: &StorageKey, data: Bytes) -> AppResult<()> {
        let path = self.blob_path(key);
        let Some(parent) = path.parent() else {
            return Err(AppError::internal("blob path has no parent"));
        };
        fs::create_dir_all(parent).await?;

        // Write beside the target then rename, so readers never see a
        // partially written blob.
        let tmp = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, &data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Wrote {} bytes for {} to {}", data.len(), key, path.display());
        Ok(())
    }

    async fn get(&self, key: &StorageKey) -> AppResult<Bytes> {
        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
