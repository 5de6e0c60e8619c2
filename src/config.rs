use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub links: LinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: String,
    pub path: PathBuf,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct LinkConfig {
    /// HMAC key for signed links. `None` means a per-process key is generated.
    pub secret: Option<String>,
    pub default_ttl_secs: u64,
    pub max_ttl_secs: u64,
    pub public_url: String,
}

impl LinkConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs)
    }
}

// Keeps the secret out of startup logs
impl std::fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("default_ttl_secs", &self.default_ttl_secs)
            .field("max_ttl_secs", &self.max_ttl_secs)
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_var(&var, "PORT", 3000)?;

        Ok(Self {
            server: ServerConfig {
                port,
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                max_upload_bytes: parse_var(&var, "MAX_UPLOAD_BYTES", 64 * 1024 * 1024)?,
            },
            storage: StorageConfig {
                provider: var("STORAGE_PROVIDER").unwrap_or_else(|| "filesystem".to_string()),
                path: var("STORAGE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data")),
                s3_bucket: var("S3_BUCKET").unwrap_or_default(),
                s3_region: var("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                s3_access_key_id: var("AWS_ACCESS_KEY_ID"),
                s3_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
                s3_endpoint: var("S3_ENDPOINT"),
            },
            links: LinkConfig {
                secret: var("LINK_SECRET").filter(|s| !s.is_empty()),
                default_ttl_secs: parse_var(&var, "LINK_TTL_SECS", 3600)?,
                max_ttl_secs: parse_var(&var, "LINK_MAX_TTL_SECS", 7 * 24 * 3600)?,
                public_url: var("PUBLIC_URL")
                    .unwrap_or_else(|| format!("http://localhost:{}", port))
                    .trim_end_matches('/')
                    .to_string(),
            },
        })
    }
}

fn parse_var<F, T>(var: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        None => Ok(default),
    }
}
