//! # Chain Links
//!
//! `link = HMAC-SHA256(key, previous_link + "|" + content_hash)`, hex encoded.
//! The first ACTIVE entry links to `GENESIS_HASH`.

use crate::domain::errors::IntegrityError;
use shared_crypto::{hmac_sha256_hex, verify_hmac_sha256_hex};

/// Link value preceding the first ACTIVE entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub const LINK_SEPARATOR: &str = "|";

fn link_message(previous_hash: &str, content_hash: &str) -> String {
    format!("{previous_hash}{LINK_SEPARATOR}{content_hash}")
}

/// Compute the keyed checksum binding `content_hash` to its predecessor.
pub fn compute_link(
    key: &[u8],
    previous_hash: &str,
    content_hash: &str,
) -> Result<String, IntegrityError> {
    hmac_sha256_hex(key, link_message(previous_hash, content_hash).as_bytes())
        .map_err(|e| IntegrityError::Checksum(e.to_string()))
}

/// Constant-time check of a stored link under one key.
pub fn link_matches(key: &[u8], previous_hash: &str, content_hash: &str, stored: &str) -> bool {
    verify_hmac_sha256_hex(
        key,
        link_message(previous_hash, content_hash).as_bytes(),
        stored,
    )
}
