//! `logstore store ...` commands
//!
//! Each subcommand maps onto one [`BlobTransfer`] operation. Link and
//! upload results are printed as the same pretty JSON the HTTP surface
//! returns; downloads write raw bytes.

use bytes::Bytes;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::models::UploadResponse;
use crate::routes::response::to_pretty_json;
use crate::transfer::{BlobRef, BlobTransfer};
use crate::types::{AppError, AppResult};

/// Target of every store command.
#[derive(Debug, Clone, Args)]
pub struct BlobArgs {
    /// Account identifier the key belongs to
    #[arg(value_name = "ACCOUNT_ID")]
    pub account_id: String,

    /// Log key within the account
    pub key: String,

    /// Snapshot name qualifying the key (empty means none)
    #[arg(long)]
    pub snapshot: Option<String>,
}

impl BlobArgs {
    fn blob_ref(&self) -> BlobRef<'_> {
        BlobRef::new(&self.account_id, &self.key, self.snapshot.as_deref())
    }
}

#[derive(Debug, Subcommand)]
pub enum StoreCommand {
    /// Download a blob
    Download {
        #[command(flatten)]
        blob: BlobArgs,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Issue a signed download link
    DownloadLink {
        #[command(flatten)]
        blob: BlobArgs,

        /// Link lifetime in seconds
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Upload a blob
    Upload {
        #[command(flatten)]
        blob: BlobArgs,

        /// Read from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Issue a signed upload link
    UploadLink {
        #[command(flatten)]
        blob: BlobArgs,

        /// Link lifetime in seconds
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

/// Links printed by the CLI are redeemed by a server, which can only
/// check them against a configured secret.
fn require_shared_secret(transfer: &BlobTransfer) -> AppResult<()> {
    if transfer.issuer().is_ephemeral() {
        return Err(AppError::invalid_argument(
            "LINK_SECRET must be set to issue links from the command line",
        ));
    }
    Ok(())
}

/// Run a store command, writing its result to `out`.
pub async fn execute<W>(transfer: &BlobTransfer, command: StoreCommand, out: &mut W) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    match command {
        StoreCommand::Download { blob, output } => {
            let data = transfer.download(blob.blob_ref()).await?;
            match output {
                Some(path) => tokio::fs::write(path, &data).await?,
                None => out.write_all(&data).await?,
            }
        }
        StoreCommand::DownloadLink { blob, ttl_secs } => {
            require_shared_secret(transfer)?;
            let link = transfer.download_link(blob.blob_ref(), ttl_secs.map(Duration::from_secs))?;
            out.write_all(&to_pretty_json(&link)?).await?;
        }
        StoreCommand::Upload { blob, file } => {
            let data = match file {
                Some(path) => tokio::fs::read(path).await?,
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin().read_to_end(&mut buf).await?;
                    buf
                }
            };
            let size = data.len();
            let key = transfer.upload(blob.blob_ref(), Bytes::from(data)).await?;
            out.write_all(&to_pretty_json(&UploadResponse { key, size })?)
                .await?;
        }
        StoreCommand::UploadLink { blob, ttl_secs } => {
            require_shared_secret(transfer)?;
            let link = transfer.upload_link(blob.blob_ref(), ttl_secs.map(Duration::from_secs))?;
            out.write_all(&to_pretty_json(&link)?).await?;
        }
    }
    out.flush().await?;
    Ok(())
}
