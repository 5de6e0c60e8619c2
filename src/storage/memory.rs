use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{not_found, BlobStore, StorageKey};
use crate::types::AppResult;

/// Process-local store, used for tests and throwaway servers.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<StorageKey, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, key: &StorageKey, data: Bytes) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        guard.insert(key.clone(), data);
        Ok(())
    }

    async fn get(&self, key: &StorageKey) -> AppResult<Bytes> {
        let guard = self.inner.read().await;
        guard.get(key).cloned().ok_or_else(|| not_found(key))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
