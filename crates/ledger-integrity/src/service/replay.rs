//! # Replay Guard
//!
//! Two uniqueness reservations make a signed intent consumable exactly once:
//!
//! | Table | Key | Violation |
//! |-------|-----|-----------|
//! | nonce | nonce value | `ReplayDetected` |
//! | action intent | transaction id | `DuplicateTransaction` |
//!
//! A reused transaction id with a fresh nonce is an idempotent retry; a reused
//! nonce is a replay. The nonce check runs first so a verbatim resubmission
//! always reports as a replay.

use crate::domain::errors::IntegrityError;
use crate::domain::intent::{ActionIntent, NonceRecord, ReplayReservation, VerifiedIntent};
use crate::ports::outbound::{ReplayStore, TimeSource};
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Replay protection over a `ReplayStore`.
#[derive(Clone)]
pub struct ReplayGuard {
    store: Arc<dyn ReplayStore>,
    clock: Arc<dyn TimeSource>,
    nonce_ttl: Duration,
}

impl ReplayGuard {
    pub fn new(
        store: Arc<dyn ReplayStore>,
        clock: Arc<dyn TimeSource>,
        nonce_ttl_secs: i64,
    ) -> Self {
        Self {
            store,
            clock,
            nonce_ttl: Duration::seconds(nonce_ttl_secs),
        }
    }

    /// Fail early when either key is already taken.
    ///
    /// The store re-checks both inside the final atomic write.
    pub async fn check(&self, nonce: &str, tx_id: &str) -> Result<(), IntegrityError> {
        if self.store.nonce_exists(nonce, self.clock.now()).await? {
            warn!(tx_id, "Replay rejected: nonce already used");
            return Err(IntegrityError::ReplayDetected);
        }
        if self.store.intent_exists(tx_id).await? {
            warn!(tx_id, "Duplicate transaction id rejected");
            return Err(IntegrityError::DuplicateTransaction(tx_id.to_string()));
        }
        Ok(())
    }

    /// Build the nonce row that accompanies `intent`.
    ///
    /// The TTL runs from the later of the creation time and the signed
    /// timestamp, so a future-dated intent keeps its nonce until it is stale.
    pub fn reservation(&self, intent: ActionIntent) -> ReplayReservation {
        let created_at = intent.created_at;
        let anchor = created_at.max(intent.intent_timestamp);
        ReplayReservation {
            nonce: NonceRecord {
                nonce: intent.nonce.clone(),
                actor_id: intent.actor_id.clone(),
                tx_id: intent.tx_id.clone(),
                created_at,
                expires_at: anchor + self.nonce_ttl,
            },
            intent,
        }
    }

    /// Consume a verified intent that produces no ledger entry.
    pub async fn consume(&self, intent: &VerifiedIntent) -> Result<(), IntegrityError> {
        self.store.reserve(intent.reservation().clone()).await?;
        info!(
            tx_id = intent.tx_id(),
            actor_id = intent.actor_id(),
            action = %intent.action(),
            "Consumed signed intent"
        );
        Ok(())
    }

    /// Drop expired nonce rows. Intent rows are kept forever.
    pub async fn purge_expired(&self) -> Result<usize, IntegrityError> {
        let purged = self.store.purge_expired_nonces(self.clock.now()).await?;
        debug!(purged, "Purged expired nonces");
        Ok(purged)
    }
}
