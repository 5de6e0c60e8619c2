//! Account-scoped blob transfer
//!
//! Entry point for both transports. Every operation resolves its storage
//! key through [`crate::storage::namespace`] first; direct transfers then go
//! to the [`BlobStore`], link operations go to the [`LinkIssuer`] and never
//! touch the store.

use bytes::Bytes;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::links::{LinkIssuer, LinkMode, SignedLink};
use crate::storage::{build_snapshot_key, create_store, BlobStore, StorageKey};
use crate::types::AppResult;

/// Coarse progress of one request, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    KeyResolved,
    TransferInFlight,
    LinkIssued,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Received => "received",
            Phase::KeyResolved => "key_resolved",
            Phase::TransferInFlight => "transfer_in_flight",
            Phase::LinkIssued => "link_issued",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Target of a request: the caller's account, a log key and an optional
/// snapshot, as they arrived at the boundary.
#[derive(Debug, Clone, Copy)]
pub struct BlobRef<'a> {
    pub account_id: &'a str,
    pub key: &'a str,
    pub snapshot: Option<&'a str>,
}

impl<'a> BlobRef<'a> {
    /// An empty snapshot, as sent by `snapshot=` or `--snapshot ""`, is
    /// treated as no snapshot. [`build_snapshot_key`] itself rejects one.
    pub fn new(account_id: &'a str, key: &'a str, snapshot: Option<&'a str>) -> Self {
        Self {
            account_id,
            key,
            snapshot: snapshot.filter(|s| !s.is_empty()),
        }
    }

    fn resolve(&self) -> AppResult<StorageKey> {
        build_snapshot_key(self.account_id, self.key, self.snapshot)
    }
}

pub struct BlobTransfer {
    store: Arc<dyn BlobStore>,
    issuer: LinkIssuer,
    default_ttl: Duration,
}

impl BlobTransfer {
    pub fn new(store: Arc<dyn BlobStore>, issuer: LinkIssuer, default_ttl: Duration) -> Self {
        Self {
            store,
            issuer,
            default_ttl,
        }
    }

    /// Wire up the configured store and link issuer.
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let store = create_store(&config.storage).await?;
        let issuer = LinkIssuer::from_config(&config.links)?;
        Ok(Self::new(store, issuer, config.links.default_ttl()))
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn issuer(&self) -> &LinkIssuer {
        &self.issuer
    }

    /// Write `data` under the resolved key, replacing any existing blob.
    pub async fn upload(&self, blob: BlobRef<'_>, data: Bytes) -> AppResult<StorageKey> {
        trace_phase("upload", Phase::Received);
        let key = finish("upload", blob.resolve())?;
        trace_phase("upload", Phase::KeyResolved);

        let size = data.len();
        trace_phase("upload", Phase::TransferInFlight);
        finish("upload", self.store.put(&key, data).await)?;

        info!("Uploaded {} bytes to {}", size, key);
        trace_phase("upload", Phase::Completed);
        Ok(key)
    }

    pub async fn download(&self, blob: BlobRef<'_>) -> AppResult<Bytes> {
        trace_phase("download", Phase::Received);
        let key = finish("download", blob.resolve())?;
        trace_phase("download", Phase::KeyResolved);

        trace_phase("download", Phase::TransferInFlight);
        let data = finish("download", self.store.get(&key).await)?;

        info!("Downloaded {} bytes from {}", data.len(), key);
        trace_phase("download", Phase::Completed);
        Ok(data)
    }

    pub fn upload_link(&self, blob: BlobRef<'_>, ttl: Option<Duration>) -> AppResult<SignedLink> {
        self.link("upload_link", blob, LinkMode::Upload, ttl)
    }

    pub fn download_link(
        &self,
        blob: BlobRef<'_>,
        ttl: Option<Duration>,
    ) -> AppResult<SignedLink> {
        self.link("download_link", blob, LinkMode::Download, ttl)
    }

    fn link(
        &self,
        op: &'static str,
        blob: BlobRef<'_>,
        mode: LinkMode,
        ttl: Option<Duration>,
    ) -> AppResult<SignedLink> {
        trace_phase(op, Phase::Received);
        let key = finish(op, blob.resolve())?;
        trace_phase(op, Phase::KeyResolved);

        let ttl = ttl.unwrap_or(self.default_ttl);
        let link = finish(op, self.issuer.issue(&key, blob.snapshot, mode, ttl))?;
        trace_phase(op, Phase::LinkIssued);

        info!("Issued {} link for {} valid until {}", mode, key, link.expires);
        trace_phase(op, Phase::Completed);
        Ok(link)
    }

    /// Perform the upload a signed link authorises. `query` is the link's
    /// query string.
    pub async fn redeem_upload(&self, query: &str, data: Bytes) -> AppResult<StorageKey> {
        trace_phase("redeem_upload", Phase::Received);
        let claims = finish(
            "redeem_upload",
            self.issuer.validate_query_at(query, LinkMode::Upload, Utc::now()),
        )?;
        trace_phase("redeem_upload", Phase::KeyResolved);

        let size = data.len();
        trace_phase("redeem_upload", Phase::TransferInFlight);
        finish("redeem_upload", self.store.put(&claims.key, data).await)?;

        info!("Uploaded {} bytes to {} via signed link", size, claims.key);
        trace_phase("redeem_upload", Phase::Completed);
        Ok(claims.key)
    }

    /// Perform the download a signed link authorises.
    pub async fn redeem_download(&self, query: &str) -> AppResult<Bytes> {
        trace_phase("redeem_download", Phase::Received);
        let claims = finish(
            "redeem_download",
            self.issuer
                .validate_query_at(query, LinkMode::Download, Utc::now()),
        )?;
        trace_phase("redeem_download", Phase::KeyResolved);

        trace_phase("redeem_download", Phase::TransferInFlight);
        let data = finish("redeem_download", self.store.get(&claims.key).await)?;

        info!("Downloaded {} bytes from {} via signed link", data.len(), claims.key);
        trace_phase("redeem_download", Phase::Completed);
        Ok(data)
    }
}

fn trace_phase(op: &'static str, phase: Phase) {
    debug!(op, %phase, "transfer phase");
}

/// Record the terminal phase of a failing step and pass the result on.
fn finish<T>(op: &'static str, result: AppResult<T>) -> AppResult<T> {
    if let Err(e) = &result {
        warn!(op, phase = %Phase::Failed, "{}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::AppError;
    use url::Url;

    fn transfer() -> BlobTransfer {
        let issuer = LinkIssuer::new(
            "transfer-secret",
            "http://localhost:3000",
            Duration::from_secs(3600),
        )
        .unwrap();
        BlobTransfer::new(Arc::new(MemoryStore::new()), issuer, Duration::from_secs(60))
    }

    fn query_of(link: &SignedLink) -> String {
        Url::parse(&link.url).unwrap().query().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let transfer = transfer();
        let blob = BlobRef::new("acct1", "logA", None);

        let key = transfer
            .upload(blob, Bytes::from_static(b"step 1 ok\n"))
            .await
            .unwrap();
        assert_eq!(key.as_str(), "acct1/logA");

        let data = transfer.download(blob).await.unwrap();
        assert_eq!(&data[..], b"step 1 ok\n");
    }

    #[tokio::test]
    async fn test_accounts_are_isolated() {
        let transfer = transfer();
        transfer
            .upload(BlobRef::new("acct1", "logA", None), Bytes::from_static(b"mine"))
            .await
            .unwrap();

        let result = transfer.download(BlobRef::new("acct2", "logA", None)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_snapshots_coexist() {
        let transfer = transfer();
        transfer
            .upload(BlobRef::new("acct1", "logA", Some("a")), Bytes::from_static(b"A"))
            .await
            .unwrap();
        transfer
            .upload(BlobRef::new("acct1", "logA", Some("b")), Bytes::from_static(b"B"))
            .await
            .unwrap();

        assert_eq!(
            &transfer.download(BlobRef::new("acct1", "logA", Some("a"))).await.unwrap()[..],
            b"A"
        );
        assert_eq!(
            &transfer.download(BlobRef::new("acct1", "logA", Some("b"))).await.unwrap()[..],
            b"B"
        );
        assert!(transfer.download(BlobRef::new("acct1", "logA", None)).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_snapshot_means_none() {
        let transfer = transfer();
        transfer
            .upload(BlobRef::new("acct1", "logA", Some("")), Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(transfer.download(BlobRef::new("acct1", "logA", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_account_never_reaches_store() {
        let transfer = transfer();
        let result = transfer
            .upload(BlobRef::new("acct1/logA", "x", None), Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));

        let link = transfer.download_link(BlobRef::new("", "x", None), None);
        assert!(matches!(link, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_links_do_not_touch_store() {
        let store = Arc::new(MemoryStore::new());
        let issuer =
            LinkIssuer::new("k", "http://localhost:3000", Duration::from_secs(3600)).unwrap();
        let transfer = BlobTransfer::new(store.clone(), issuer, Duration::from_secs(60));

        let link = transfer
            .upload_link(BlobRef::new("acct1", "logA", None), None)
            .unwrap();
        assert_eq!(link.mode, LinkMode::Upload);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_redeem_links() {
        let transfer = transfer();
        let blob = BlobRef::new("acct1", "logA", Some("final"));

        let upload = transfer.upload_link(blob, None).unwrap();
        let key = transfer
            .redeem_upload(&query_of(&upload), Bytes::from_static(b"via link"))
            .await
            .unwrap();
        assert_eq!(key.as_str(), "acct1/logA@final");

        let download = transfer
            .download_link(blob, Some(Duration::from_secs(30)))
            .unwrap();
        let data = transfer.redeem_download(&query_of(&download)).await.unwrap();
        assert_eq!(&data[..], b"via link");

        // The upload link does not grant reads
        let result = transfer.redeem_download(&query_of(&upload)).await;
        assert!(matches!(result, Err(AppError::ModeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let transfer = transfer();
        let result = transfer.download(BlobRef::new("acct1", "never", None)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
