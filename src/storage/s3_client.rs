// S3-compatible blob store

use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tracing::{debug, error};

use super::{not_found, BlobStore, StorageKey};
use crate::config::StorageConfig;
use crate::types::{AppError, AppResult};

pub struct S3Store {
    bucket: Box<Bucket>,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> AppResult<Self> {
        if config.s3_bucket.is_empty() {
            return Err(AppError::invalid_argument(
                "S3_BUCKET must be set for the s3 storage provider",
            ));
        }

        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .s3_region
                .parse()
                .map_err(|e| AppError::internal(format!("invalid S3 region: {}", e)))?,
        };

        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::internal(format!("S3 credentials: {}", e)))?;

        let mut bucket = Bucket::new(&config.s3_bucket, region, credentials)
            .map_err(|e| AppError::internal(format!("S3 bucket: {}", e)))?;
        // Custom endpoints (MinIO and friends) rarely support virtual-host addressing
        if config.s3_endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket: Box::new(bucket) })
    }

    fn object_path(key: &StorageKey) -> String {
        format!("/{}", key)
    }
}

fn is_not_found(e: &S3Error) -> bool {
    matches!(e, S3Error::HttpFailWithBody(404, _))
}

#[async_trait]
impl BlobStore for S3Store {
    async fn put(&self, key: &StorageKey, data: Bytes) -> AppResult<()> {
        let response = self
            .bucket
            .put_object(Self::object_path(key), &data)
            .await
            .map_err(|e| {
                error!("S3 put failed for {}: {}", key, e);
                AppError::internal(e.to_string())
            })?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            error!("S3 put for {} returned status {}", key, status);
            return Err(AppError::internal(format!("S3 put returned status {}", status)));
        }
        debug!("Stored {} bytes at s3://{}/{}", data.len(), self.bucket.name(), key);
        Ok(())
    }

    async fn get(&self, key: &StorageKey) -> AppResult<Bytes> {
        let response = match self.bucket.get_object(Self::object_path(key)).await {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Err(not_found(key)),
            Err(e) => {
                error!("S3 get failed for {}: {}", key, e);
                return Err(AppError::internal(e.to_string()));
            }
        };

        match response.status_code() {
            200..=299 => Ok(response.bytes().clone()),
            404 => Err(not_found(key)),
            status => {
                error!("S3 get for {} returned status {}", key, status);
                Err(AppError::internal(format!("S3 get returned status {}", status)))
            }
        }
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::build_snapshot_key;
    use std::path::PathBuf;

    fn config(bucket: &str) -> StorageConfig {
        StorageConfig {
            provider: "s3".to_string(),
            path: PathBuf::new(),
            s3_bucket: bucket.to_string(),
            s3_region: "us-east-1".to_string(),
            s3_access_key_id: Some("test-access".to_string()),
            s3_secret_access_key: Some("test-secret".to_string()),
            s3_endpoint: Some("http://localhost:9000".to_string()),
        }
    }

    #[test]
    fn test_requires_bucket() {
        assert!(matches!(S3Store::new(&config("")), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_object_path_uses_storage_key() {
        let key = build_snapshot_key("acct1", "builds/9", Some("final")).unwrap();
        assert_eq!(S3Store::object_path(&key), "/acct1/builds/9@final");
    }

    #[test]
    fn test_custom_endpoint_uses_path_style() {
        let store = S3Store::new(&config("logs")).unwrap();
        assert_eq!(store.name(), "s3");
        assert!(store.bucket.is_path_style());

        let aws = S3Store::new(&StorageConfig {
            s3_endpoint: None,
            ..config("logs")
        })
        .unwrap();
        assert!(!aws.bucket.is_path_style());
    }
}
