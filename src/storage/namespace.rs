//! Account-scoped key construction
//!
//! Every storage key in the service is built here. A key has the shape
//! `<account>/<log key>` with an optional `@<snapshot>` suffix:
//!
//! - account ids never contain `/`, so the first `/` always ends the account
//! - log keys never contain `@`, so the suffix always names the snapshot
//!
//! Together these make the mapping from `(account, log key, snapshot)` to a
//! storage key injective, which is what keeps tenants apart.

use serde::Serialize;
use std::fmt;

use crate::types::{AppError, AppResult};

/// Separator between the account id and the log key.
pub const ACCOUNT_SEPARATOR: char = '/';

/// Marker between the log key and a snapshot name.
pub const SNAPSHOT_MARKER: char = '@';

/// Namespaced key used against the underlying store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild a key from a value that was produced by this module and has
    /// since been carried inside a verified signature.
    pub(crate) fn from_trusted(key: String) -> Self {
        StorageKey(key)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the storage key for a log stream of an account.
///
/// ```
/// use logstore::storage::build_key;
///
/// let key = build_key("acct1", "logA").unwrap();
/// assert_eq!(key.as_str(), "acct1/logA");
/// ```
pub fn build_key(account_id: &str, log_key: &str) -> AppResult<StorageKey> {
    build_snapshot_key(account_id, log_key, None)
}

/// Build the storage key for a log stream, qualified by a snapshot when one
/// is given.
pub fn build_snapshot_key(
    account_id: &str,
    log_key: &str,
    snapshot: Option<&str>,
) -> AppResult<StorageKey> {
    validate_account_id(account_id)?;
    validate_log_key(log_key)?;

    let mut key = String::with_capacity(account_id.len() + log_key.len() + 1);
    key.push_str(account_id);
    key.push(ACCOUNT_SEPARATOR);
    key.push_str(log_key);

    if let Some(snapshot) = snapshot {
        validate_snapshot(snapshot)?;
        key.push(SNAPSHOT_MARKER);
        key.push_str(snapshot);
    }

    Ok(StorageKey(key))
}

pub fn validate_account_id(account_id: &str) -> AppResult<()> {
    if account_id.is_empty() {
        return Err(AppError::invalid_argument("accountID must not be empty"));
    }
    if account_id.contains(ACCOUNT_SEPARATOR) {
        return Err(AppError::invalid_argument(format!(
            "accountID must not contain '{}'",
            ACCOUNT_SEPARATOR
        )));
    }
    if is_dot_segment(account_id) {
        return Err(AppError::invalid_argument("accountID must not be '.' or '..'"));
    }
    if has_control(account_id) {
        return Err(AppError::invalid_argument(
            "accountID must not contain control characters",
        ));
    }
    Ok(())
}

pub fn validate_log_key(log_key: &str) -> AppResult<()> {
    if log_key.is_empty() {
        return Err(AppError::invalid_argument("key must not be empty"));
    }
    if log_key.contains(SNAPSHOT_MARKER) {
        return Err(AppError::invalid_argument(format!(
            "key must not contain '{}'",
            SNAPSHOT_MARKER
        )));
    }
    if log_key.contains('\\') || has_control(log_key) {
        return Err(AppError::invalid_argument(
            "key must not contain backslashes or control characters",
        ));
    }
    for segment in log_key.split(ACCOUNT_SEPARATOR) {
        if segment.is_empty() {
            return Err(AppError::invalid_argument(
                "key must not start or end with '/' or contain empty segments",
            ));
        }
        if is_dot_segment(segment) {
            return Err(AppError::invalid_argument(
                "key must not contain '.' or '..' segments",
            ));
        }
    }
    Ok(())
}

pub fn validate_snapshot(snapshot: &str) -> AppResult<()> {
    if snapshot.is_empty() {
        return Err(AppError::invalid_argument("snapshot must not be empty"));
    }
    if snapshot.contains(ACCOUNT_SEPARATOR) || snapshot.contains(SNAPSHOT_MARKER) {
        return Err(AppError::invalid_argument(format!(
            "snapshot must not contain '{}' or '{}'",
            ACCOUNT_SEPARATOR, SNAPSHOT_MARKER
        )));
    }
    if is_dot_segment(snapshot) || snapshot.contains('\\') || has_control(snapshot) {
        return Err(AppError::invalid_argument(format!(
            "invalid snapshot name: {:?}",
            snapshot
        )));
    }
    Ok(())
}

fn is_dot_segment(s: &str) -> bool {
    s == "." || s == ".."
}

fn has_control(s: &str) -> bool {
    s.chars().any(char::is_control)
}
