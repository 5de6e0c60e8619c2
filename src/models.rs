use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::storage::StorageKey;
use crate::transfer::{BlobRef, BlobTransfer};
use crate::types::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub transfer: Arc<BlobTransfer>,
    pub config: Arc<Config>,
}

/// Boundary parameters shared by the blob endpoints.
///
/// Every field is optional at the extractor level so that missing values
/// are reported through the error envelope rather than axum's plain-text
/// rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlobParams {
    #[serde(rename = "accountID")]
    pub account_id: Option<String>,
    pub key: Option<String>,
    /// `snapshot=` with no value addresses the plain key.
    pub snapshot: Option<String>,
}

impl BlobParams {
    pub fn blob_ref(&self) -> AppResult<BlobRef<'_>> {
        let account_id = self
            .account_id
            .as_deref()
            .ok_or_else(|| AppError::invalid_argument("missing accountID parameter"))?;
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| AppError::invalid_argument("missing key parameter"))?;
        Ok(BlobRef::new(account_id, key, self.snapshot.as_deref()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub key: StorageKey,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage: String,
}
