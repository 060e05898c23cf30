//! # Outbound Ports (Driven Ports / SPI)
//!
//! Storage and clock dependencies of the integrity core.
//!
//! Every uniqueness rule of the data model is enforced by the store, not by a
//! check-then-insert in the service: the service pre-checks only to produce a
//! precise error early.

use crate::domain::intent::{ActorRole, ReplayReservation};
use crate::domain::keys::ActorKey;
use crate::domain::ledger::{BalanceAggregate, BalanceOwner, LedgerEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Which uniqueness rule a write violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueConstraint {
    /// Nonce value already reserved.
    Nonce,
    /// Action-intent row for this transaction id already exists.
    IntentTransaction,
    /// Ledger entry for this transaction id already exists.
    EntryTransaction,
    /// (actor, keyId) already registered.
    ActorKeyId,
}

/// Error from store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unique constraint {constraint:?} violated by {key}")]
    UniqueViolation {
        constraint: UniqueConstraint,
        key: String,
    },

    /// Backend I/O or consistency failure.
    #[error("Store backend failure: {0}")]
    Backend(String),
}

// =============================================================================
// ACTOR KEYS
// =============================================================================

/// Persistence for actor keys.
#[async_trait]
pub trait ActorKeyStore: Send + Sync {
    /// Look up a key by (actor, keyId, role), in any status.
    async fn find_key(
        &self,
        actor_id: &str,
        key_id: &str,
        role: ActorRole,
    ) -> Result<Option<ActorKey>, StoreError>;

    /// Highest version ever issued for (actor, role), across all statuses.
    async fn latest_version(&self, actor_id: &str, role: ActorRole)
        -> Result<Option<u32>, StoreError>;

    /// Atomically revoke the current ACTIVE key for (actor, role) at
    /// `revoked_at` and insert `key` as the new ACTIVE key.
    ///
    /// The stored `key_version` is assigned inside the same unit as the
    /// previous highest version for (actor, role) plus one. Returns the
    /// stored row.
    ///
    /// # Errors
    /// * `UniqueViolation { ActorKeyId }` - (actor, keyId) already exists; nothing changes
    async fn rotate_key(
        &self,
        key: ActorKey,
        revoked_at: DateTime<Utc>,
    ) -> Result<ActorKey, StoreError>;

    /// Mark one key REVOKED. Returns the updated row, or `None` if absent.
    async fn revoke_key(
        &self,
        actor_id: &str,
        key_id: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Option<ActorKey>, StoreError>;

    /// All keys of an actor, any role and status, oldest first.
    async fn list_keys(&self, actor_id: &str) -> Result<Vec<ActorKey>, StoreError>;
}

// =============================================================================
// REPLAY
// =============================================================================

/// Nonce and action-intent tables.
#[async_trait]
pub trait ReplayStore: Send + Sync {
    /// Whether an unexpired row for `nonce` exists at `now`.
    async fn nonce_exists(&self, nonce: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn intent_exists(&self, tx_id: &str) -> Result<bool, StoreError>;

    /// Insert both rows of a reservation, or neither.
    ///
    /// # Errors
    /// * `UniqueViolation { Nonce }` - nonce already reserved
    /// * `UniqueViolation { IntentTransaction }` - transaction id already consumed
    async fn reserve(&self, reservation: ReplayReservation) -> Result<(), StoreError>;

    /// Delete nonce rows expired at `now`. Returns the number removed.
    async fn purge_expired_nonces(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

// =============================================================================
// LEDGER
// =============================================================================

/// One atomic ledger write.
#[derive(Clone, Debug)]
pub struct LedgerCommit {
    pub entry: LedgerEntry,
    /// Present for ACTIVE writes; committed in the same unit as the entry.
    pub replay: Option<ReplayReservation>,
}

/// Append-only ledger with derived balance aggregates.
#[async_trait]
pub trait LedgerStore: ReplayStore {
    /// Most recent ACTIVE entry in commit order.
    async fn latest_active_entry(&self) -> Result<Option<LedgerEntry>, StoreError>;

    /// Apply entry + replay rows + balance deltas as one unit, or nothing.
    ///
    /// # Errors
    /// * `UniqueViolation` - nonce, intent or entry transaction id taken
    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError>;

    async fn entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, StoreError>;

    /// Every entry in commit order.
    async fn entries(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn balance(&self, owner: &BalanceOwner) -> Result<BalanceAggregate, StoreError>;
}

// =============================================================================
// TIME
// =============================================================================

/// Abstract interface for wall-clock time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
