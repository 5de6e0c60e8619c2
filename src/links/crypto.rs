//! HMAC-SHA256 signing for access links
//!
//! Digests are hex encoded. Verification goes through `Mac::verify_slice`,
//! which compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// HMAC type alias for SHA-256
type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid HMAC key length")]
    InvalidKeyLength,
}

/// Sign `data` with `secret`, returning the hex digest.
///
/// ```
/// use logstore::links::crypto::sign;
///
/// let signature = sign(b"payload", b"secret").unwrap();
/// assert_eq!(signature.len(), 64);
/// ```
pub fn sign(data: &[u8], secret: &[u8]) -> Result<String, CryptoError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| CryptoError::InvalidKeyLength)?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex digest produced by [`sign`]. Malformed hex never verifies.
pub fn verify(data: &[u8], signature_hex: &str, secret: &[u8]) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&signature).is_ok()
}
