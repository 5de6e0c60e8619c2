//! Signed, time-limited access links
//!
//! A link authorises exactly one operation (upload or download) against
//! exactly one storage key until its expiry. It carries everything needed to
//! check it, so issuing and validating need nothing but the signing secret:
//!
//! ```text
//! {public_url}/blob/signed?key=acct1%2FlogA&mode=download&expires=1700000000000&signature=9f2c...
//! ```
//!
//! The signature is an HMAC-SHA256 over the canonical JSON of
//! `{key, snapshot, mode, expires}`. Changing any of those in the URL breaks
//! it. Links are never stored, deduplicated or revoked; they just expire.

pub mod crypto;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::LinkConfig;
use crate::storage::StorageKey;
use crate::types::{AppError, AppResult};

/// Path under the public URL where links are redeemed.
pub const SIGNED_PATH: &str = "/blob/signed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    Upload,
    Download,
}

impl LinkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkMode::Upload => "upload",
            LinkMode::Download => "download",
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(LinkMode::Upload),
            "download" => Ok(LinkMode::Download),
            other => Err(AppError::invalid_argument(format!(
                "unknown link mode: {}",
                other
            ))),
        }
    }
}

/// An issued link, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedLink {
    #[serde(rename = "link")]
    pub url: String,
    pub mode: LinkMode,
    pub expires: DateTime<Utc>,
    pub key: StorageKey,
}

/// What a successfully validated link grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkClaims {
    pub key: StorageKey,
    pub snapshot: Option<String>,
    pub mode: LinkMode,
    pub expires: DateTime<Utc>,
}

/// Signed portion of a link. Field order is fixed by the struct.
#[derive(Serialize)]
struct LinkPayload<'a> {
    key: &'a str,
    snapshot: Option<&'a str>,
    mode: LinkMode,
    expires: i64,
}

impl LinkPayload<'_> {
    fn to_bytes(&self) -> AppResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

pub struct LinkIssuer {
    secret: Vec<u8>,
    base_url: Url,
    max_ttl: Duration,
    ephemeral: bool,
}

impl LinkIssuer {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        public_url: &str,
        max_ttl: Duration,
    ) -> AppResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AppError::invalid_argument("link secret must not be empty"));
        }

        let mut base_url = Url::parse(public_url).map_err(|e| {
            AppError::invalid_argument(format!("invalid public URL {:?}: {}", public_url, e))
        })?;
        base_url
            .path_segments_mut()
            .map_err(|_| {
                AppError::invalid_argument(format!("public URL cannot be a base: {}", public_url))
            })?
            .pop_if_empty()
            .extend(SIGNED_PATH.trim_start_matches('/').split('/'));
        base_url.set_query(None);
        base_url.set_fragment(None);

        Ok(Self {
            secret,
            base_url,
            max_ttl,
            ephemeral: false,
        })
    }

    /// Build an issuer from configuration. Without a configured secret a
    /// random one is generated, so links die with the process.
    pub fn from_config(config: &LinkConfig) -> AppResult<Self> {
        match &config.secret {
            Some(secret) => Self::new(secret.as_bytes(), &config.public_url, config.max_ttl()),
            None => {
                warn!("LINK_SECRET not set - generating an ephemeral signing key");
                let secret = rand::random::<[u8; 32]>().to_vec();
                let mut issuer = Self::new(secret, &config.public_url, config.max_ttl())?;
                issuer.ephemeral = true;
                Ok(issuer)
            }
        }
    }

    /// True when the signing key was generated for this process only, so no
    /// other process can validate the links it issues.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    pub fn issue(
        &self,
        key: &StorageKey,
        snapshot: Option<&str>,
        mode: LinkMode,
        ttl: Duration,
    ) -> AppResult<SignedLink> {
        self.issue_at(key, snapshot, mode, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        key: &StorageKey,
        snapshot: Option<&str>,
        mode: LinkMode,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<SignedLink> {
        if ttl.is_zero() {
            return Err(AppError::invalid_argument("link ttl must be positive"));
        }
        if ttl > self.max_ttl {
            return Err(AppError::invalid_argument(format!(
                "link ttl {}s exceeds the maximum of {}s",
                ttl.as_secs(),
                self.max_ttl.as_secs()
            )));
        }

        let expires_ms = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map(|expires| expires.timestamp_millis())
            .ok_or_else(|| AppError::invalid_argument("link ttl out of range"))?;
        let expires = from_millis(expires_ms)
            .ok_or_else(|| AppError::invalid_argument("link ttl out of range"))?;

        let payload = LinkPayload {
            key: key.as_str(),
            snapshot,
            mode,
            expires: expires_ms,
        };
        let signature = crypto::sign(&payload.to_bytes()?, &self.secret)
            .map_err(|e| AppError::internal(e.to_string()))?;

        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", key.as_str());
            if let Some(snapshot) = snapshot {
                query.append_pair("snapshot", snapshot);
            }
            query
                .append_pair("mode", mode.as_str())
                .append_pair("expires", &expires_ms.to_string())
                .append_pair("signature", &signature);
        }

        debug!("Issued {} link for {} expiring at {}", mode, key, expires);
        Ok(SignedLink {
            url: url.into(),
            mode,
            expires,
            key: key.clone(),
        })
    }

    /// Validate a full link URL for the requested operation.
    pub fn validate(&self, link: &str, mode: LinkMode) -> AppResult<LinkClaims> {
        self.validate_at(link, mode, Utc::now())
    }

    pub fn validate_at(
        &self,
        link: &str,
        mode: LinkMode,
        now: DateTime<Utc>,
    ) -> AppResult<LinkClaims> {
        let url = Url::parse(link).map_err(|_| AppError::SignatureInvalid)?;
        self.validate_query_at(url.query().unwrap_or_default(), mode, now)
    }

    /// Validate the query string of a request redeeming a link.
    pub fn validate_query_at(
        &self,
        query: &str,
        mode: LinkMode,
        now: DateTime<Utc>,
    ) -> AppResult<LinkClaims> {
        let params = LinkParams::parse(query)?;

        let payload = LinkPayload {
            key: &params.key,
            snapshot: params.snapshot.as_deref(),
            mode: params.mode,
            expires: params.expires_ms,
        };
        if !crypto::verify(&payload.to_bytes()?, &params.signature, &self.secret) {
            debug!("Rejected link for {}: bad signature", params.key);
            return Err(AppError::SignatureInvalid);
        }

        if params.mode != mode {
            return Err(AppError::ModeMismatch {
                issued: params.mode,
                requested: mode,
            });
        }

        let expires = from_millis(params.expires_ms).ok_or(AppError::SignatureInvalid)?;
        if now > expires {
            debug!("Rejected link for {}: expired at {}", params.key, expires);
            return Err(AppError::Expired);
        }

        Ok(LinkClaims {
            key: StorageKey::from_trusted(params.key),
            snapshot: params.snapshot,
            mode: params.mode,
            expires,
        })
    }
}

/// Raw fields of a link query. Anything missing, repeated or unparseable is
/// treated as a bad signature.
struct LinkParams {
    key: String,
    snapshot: Option<String>,
    mode: LinkMode,
    expires_ms: i64,
    signature: String,
}

impl LinkParams {
    fn parse(query: &str) -> AppResult<Self> {
        let mut key = None;
        let mut snapshot = None;
        let mut mode = None;
        let mut expires = None;
        let mut signature = None;

        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match name.as_ref() {
                "key" => &mut key,
                "snapshot" => &mut snapshot,
                "mode" => &mut mode,
                "expires" => &mut expires,
                "signature" => &mut signature,
                _ => continue,
            };
            if slot.replace(value.into_owned()).is_some() {
                return Err(AppError::SignatureInvalid);
            }
        }

        let mode = mode
            .and_then(|m| m.parse::<LinkMode>().ok())
            .ok_or(AppError::SignatureInvalid)?;
        let expires_ms = expires
            .and_then(|e| e.parse::<i64>().ok())
            .ok_or(AppError::SignatureInvalid)?;

        Ok(Self {
            key: key.ok_or(AppError::SignatureInvalid)?,
            snapshot,
            mode,
            expires_ms,
            signature: signature.ok_or(AppError::SignatureInvalid)?,
        })
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{build_key, build_snapshot_key};

    const TTL: Duration = Duration::from_secs(600);

    fn issuer() -> LinkIssuer {
        LinkIssuer::new(
            "test-secret",
            "https://logs.example.com",
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    /// Replace one query parameter of a link.
    fn tamper(link: &str, name: &str, value: &str) -> String {
        let mut url = Url::parse(link).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == name { value.to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }

    #[test]
    fn test_issue_validate_roundtrip() {
        let issuer = issuer();
        let key = build_key("acct1", "logA").unwrap();

        let link = issuer
            .issue_at(&key, None, LinkMode::Download, TTL, now())
            .unwrap();
        assert!(link.url.starts_with("https://logs.example.com/blob/signed?"));
        assert_eq!(link.expires, now() + chrono::Duration::seconds(600));

        let claims = issuer
            .validate_at(&link.url, LinkMode::Download, now())
            .unwrap();
        assert_eq!(claims.key, key);
        assert_eq!(claims.mode, LinkMode::Download);
        assert_eq!(claims.snapshot, None);
    }

    #[test]
    fn test_valid_until_expiry_then_expired() {
        let issuer = issuer();
        let key = build_key("acct1", "logA").unwrap();
        let link = issuer
            .issue_at(&key, None, LinkMode::Upload, TTL, now())
            .unwrap();

        assert!(issuer
            .validate_at(&link.url, LinkMode::Upload, link.expires)
            .is_ok());

        let late = link.expires + chrono::Duration::milliseconds(1);
        assert!(matches!(
            issuer.validate_at(&link.url, LinkMode::Upload, late),
            Err(AppError::Expired)
        ));
    }

    #[test]
    fn test_mode_mismatch_rejected() {
        let issuer = issuer();
        let key = build_key("acct1", "logA").unwrap();
        let link = issuer
            .issue_at(&key, None, LinkMode::Upload, TTL, now())
            .unwrap();

        let err = issuer
            .validate_at(&link.url, LinkMode::Download, now())
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::ModeMismatch {
                issued: LinkMode::Upload,
                requested: LinkMode::Download
            }
        ));
    }

    #[test]
    fn test_tampering_breaks_signature() {
        let issuer = issuer();
        let key = build_key("acct1", "logA").unwrap();
        let link = issuer
            .issue_at(&key, None, LinkMode::Download, TTL, now())
            .unwrap();
        let far_future = (now() + chrono::Duration::days(365))
            .timestamp_millis()
            .to_string();

        for (name, value) in [
            ("key", "acct2/logA"),
            ("mode", "upload"),
            ("expires", far_future.as_str()),
            ("signature", "00"),
        ] {
            let forged = tamper(&link.url, name, value);
            let result = issuer.validate_at(&forged, LinkMode::Download, now());
            assert!(
                matches!(result, Err(AppError::SignatureInvalid)),
                "tampered {name} was accepted: {result:?}"
            );
        }
    }

    #[test]
    fn test_other_secret_rejected() {
        let key = build_key("acct1", "logA").unwrap();
        let link = issuer()
            .issue_at(&key, None, LinkMode::Download, TTL, now())
            .unwrap();
        let other =
            LinkIssuer::new("other-secret", "https://logs.example.com", TTL).unwrap();

        assert!(matches!(
            other.validate_at(&link.url, LinkMode::Download, now()),
            Err(AppError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_snapshot_bound_into_signature() {
        let issuer = issuer();
        let key = build_snapshot_key("acct1", "logA", Some("a")).unwrap();
        let link = issuer
            .issue_at(&key, Some("a"), LinkMode::Download, TTL, now())
            .unwrap();

        let claims = issuer
            .validate_at(&link.url, LinkMode::Download, now())
            .unwrap();
        assert_eq!(claims.snapshot.as_deref(), Some("a"));
        assert_eq!(claims.key.as_str(), "acct1/logA@a");

        let forged = tamper(&link.url, "snapshot", "b");
        assert!(matches!(
            issuer.validate_at(&forged, LinkMode::Download, now()),
            Err(AppError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_reissue_yields_new_link() {
        let issuer = issuer();
        let key = build_key("acct1", "logA").unwrap();
        let first = issuer
            .issue_at(&key, None, LinkMode::Download, TTL, now())
            .unwrap();
        let second = issuer
            .issue_at(
                &key,
                None,
                LinkMode::Download,
                TTL,
                now() + chrono::Duration::seconds(1),
            )
            .unwrap();

        assert_ne!(first.url, second.url);
        assert!(second.expires > first.expires);
    }

    #[test]
    fn test_ttl_bounds() {
        let issuer = issuer();
        let key = build_key("acct1", "logA").unwrap();

        assert!(matches!(
            issuer.issue_at(&key, None, LinkMode::Upload, Duration::ZERO, now()),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            issuer.issue_at(&key, None, LinkMode::Upload, Duration::from_secs(7200), now()),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_malformed_links() {
        let issuer = issuer();
        for link in [
            "not a url",
            "https://logs.example.com/blob/signed",
            "https://logs.example.com/blob/signed?key=a%2Fb&mode=download",
            "https://logs.example.com/blob/signed?key=a%2Fb&mode=sideways&expires=1&signature=00",
            "https://logs.example.com/blob/signed?key=a&key=b&mode=download&expires=1&signature=00",
        ] {
            assert!(
                matches!(
                    issuer.validate_at(link, LinkMode::Download, now()),
                    Err(AppError::SignatureInvalid)
                ),
                "{link} should be rejected"
            );
        }
    }

    #[test]
    fn test_public_url_with_prefix() {
        let issuer = LinkIssuer::new("k", "https://example.com/logs/", TTL).unwrap();
        let key = build_key("acct1", "logA").unwrap();
        let link = issuer
            .issue_at(&key, None, LinkMode::Download, TTL, now())
            .unwrap();
        assert!(link.url.starts_with("https://example.com/logs/blob/signed?key=acct1%2FlogA"));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(LinkIssuer::new(Vec::new(), "https://example.com", TTL).is_err());
    }

    #[test]
    fn test_generated_secret_is_process_local() {
        let config = LinkConfig {
            secret: None,
            default_ttl_secs: 60,
            max_ttl_secs: 3600,
            public_url: "http://localhost:3000".to_string(),
        };
        let first = LinkIssuer::from_config(&config).unwrap();
        let second = LinkIssuer::from_config(&config).unwrap();
        assert!(first.is_ephemeral());

        let key = build_key("acct1", "logA").unwrap();
        let link = first
            .issue_at(&key, None, LinkMode::Download, TTL, now())
            .unwrap();
        assert!(matches!(
            second.validate_at(&link.url, LinkMode::Download, now()),
            Err(AppError::SignatureInvalid)
        ));

        let shared = LinkIssuer::from_config(&LinkConfig {
            secret: Some("shared".to_string()),
            ..config
        })
        .unwrap();
        assert!(!shared.is_ephemeral());
    }

    #[test]
    fn test_signed_link_json_shape() {
        let key = build_key("acct1", "logA").unwrap();
        let link = issuer()
            .issue_at(&key, None, LinkMode::Upload, TTL, now())
            .unwrap();
        let value = serde_json::to_value(&link).unwrap();

        assert_eq!(value["mode"], "upload");
        assert_eq!(value["key"], "acct1/logA");
        assert!(value["link"].as_str().unwrap().contains("signature="));
        assert!(value["expires"].as_str().unwrap().starts_with("2024-05-01T12:10:00"));
    }
}
