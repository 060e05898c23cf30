//! # SHA-256 Hashing and HMAC-SHA256 Keyed Checksums
//!
//! Content hashes are rendered as lowercase hex so they can be embedded in
//! JSON rows and chained as text.

use crate::CryptoError;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Hash data with SHA-256 and return lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compute HMAC-SHA256 over `data` and return lowercase hex.
///
/// Empty keys are refused.
pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> Result<String, CryptoError> {
    let mac = keyed(key, data)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex HMAC-SHA256 tag in constant time.
///
/// Returns `false` for malformed hex, an empty key, or a mismatching tag.
pub fn verify_hmac_sha256_hex(key: &[u8], data: &[u8], expected_hex: &str) -> bool {
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    match keyed(key, data) {
        Ok(mac) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

fn keyed(key: &[u8], data: &[u8]) -> Result<HmacSha256, CryptoError> {
    if key.is_empty() {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: 0,
        });
    }
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: 32,
        actual: key.len(),
    })?;
    mac.update(data);
    Ok(mac)
}
