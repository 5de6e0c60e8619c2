// Storage layer: key namespacing plus the blob store backends

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

use crate::config::StorageConfig;
use crate::types::{AppError, AppResult};

pub mod filesystem;
pub mod memory;
pub mod namespace;
pub mod s3_client;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use namespace::{build_key, build_snapshot_key, StorageKey};
pub use s3_client::S3Store;

/// The underlying blob store.
///
/// Implementations only ever see keys produced by [`namespace`]. Concurrent
/// writes to the same key are resolved by the backend (last writer wins).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `key`, replacing anything already there.
    async fn put(&self, key: &StorageKey, data: Bytes) -> AppResult<()>;

    /// Read the blob under `key`, or [`AppError::NotFound`].
    async fn get(&self, key: &StorageKey) -> AppResult<Bytes>;

    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;
}

pub(crate) fn not_found(key: &StorageKey) -> AppError {
    AppError::NotFound(format!("no blob stored at {}", key))
}

/// Build the store selected by configuration
pub async fn create_store(config: &StorageConfig) -> AppResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.provider.as_str() {
        "memory" => Arc::new(MemoryStore::new()),
        "filesystem" => Arc::new(FilesystemStore::open(config.path.clone()).await?),
        "s3" => Arc::new(S3Store::new(config)?),
        other => {
            return Err(AppError::invalid_argument(format!(
                "unknown storage provider: {}",
                other
            )))
        }
    };
    info!("Using {} blob store", store.name());
    Ok(store)
}
