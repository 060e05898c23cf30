//! # Ledger Chain
//!
//! Computes and checks the keyed-checksum links between ACTIVE entries.
//!
//! ## Invariants
//!
//! - Entry i's previous hash equals entry i-1's link, in commit order
//! - New links are always computed with the current key
//! - Verification accepts the current key, then the previous one

use crate::domain::chain::{compute_link, link_matches, GENESIS_HASH};
use crate::domain::config::ChecksumKeys;
use crate::domain::errors::IntegrityError;
use crate::ports::outbound::LedgerStore;
use std::sync::Arc;
use tracing::debug;

/// Which checksum key a stored link verified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkVerification {
    Current,
    /// Verified only under the previous key (rotation grace).
    Previous,
    Mismatch,
}

/// Chain arithmetic bound to the configured checksum keys.
#[derive(Clone)]
pub struct LedgerChain {
    keys: ChecksumKeys,
    store: Arc<dyn LedgerStore>,
}

impl LedgerChain {
    pub fn new(keys: ChecksumKeys, store: Arc<dyn LedgerStore>) -> Self {
        Self { keys, store }
    }

    /// Link for a new entry, under the current key.
    pub fn link(&self, content_hash: &str, previous_hash: &str) -> Result<String, IntegrityError> {
        let link = compute_link(&self.keys.current, previous_hash, content_hash)?;
        debug!(
            previous = &previous_hash[..previous_hash.len().min(12)],
            link = &link[..12],
            "Computed chain link"
        );
        Ok(link)
    }

    /// Link of the most recent ACTIVE entry, or the genesis constant.
    pub async fn latest_hash(&self) -> Result<String, IntegrityError> {
        Ok(self
            .store
            .latest_active_entry()
            .await?
            .and_then(|entry| entry.ledger_hmac().map(str::to_string))
            .unwrap_or_else(|| GENESIS_HASH.to_string()))
    }

    /// Check a stored link against its inputs.
    pub fn verify_link(
        &self,
        content_hash: &str,
        previous_hash: &str,
        stored_link: &str,
    ) -> LinkVerification {
        let has_current = !self.keys.current.is_empty();
        self.keys
            .verification_keys()
            .enumerate()
            .find(|(_, key)| link_matches(key, previous_hash, content_hash, stored_link))
            .map_or(LinkVerification::Mismatch, |(i, _)| {
                if i == 0 && has_current {
                    LinkVerification::Current
                } else {
                    LinkVerification::Previous
                }
            })
    }

    /// Recompute a link for auditing: the key the stored link verifies under
    /// if any, else the current key.
    ///
    /// Returns the link to carry forward and how the stored one compared.
    /// Without a current key the stored link is carried forward unchanged.
    pub fn recompute(
        &self,
        content_hash: &str,
        previous_hash: &str,
        stored_link: &str,
    ) -> (String, LinkVerification) {
        match self.verify_link(content_hash, previous_hash, stored_link) {
            LinkVerification::Mismatch => {
                let link = compute_link(&self.keys.current, previous_hash, content_hash)
                    .unwrap_or_else(|_| stored_link.to_string());
                (link, LinkVerification::Mismatch)
            }
            matched => (stored_link.to_string(), matched),
        }
    }
}
