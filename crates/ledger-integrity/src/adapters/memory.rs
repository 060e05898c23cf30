//! # In-Memory Store
//!
//! Single-process implementation of every storage port.
//!
//! All tables live behind one `parking_lot::Mutex`, so each port call is one
//! atomic unit: uniqueness is checked and the write applied under the same
//! guard. The guard is never held across an `.await`.

use crate::domain::intent::{ActionIntent, ActorRole, NonceRecord, ReplayReservation};
use crate::domain::keys::{ActorKey, KeyStatus};
use crate::domain::ledger::{BalanceAggregate, BalanceOwner, CryptoStatus, LedgerEntry};
use crate::ports::outbound::{
    ActorKeyStore, LedgerCommit, LedgerStore, ReplayStore, StoreError, UniqueConstraint,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    keys: Vec<ActorKey>,
    nonces: HashMap<String, NonceRecord>,
    intents: HashMap<String, ActionIntent>,
    entries: Vec<LedgerEntry>,
    entry_by_tx: HashMap<String, usize>,
    balances: HashMap<BalanceOwner, BalanceAggregate>,
}

impl Tables {
    fn purge_nonces(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.nonces.len();
        self.nonces.retain(|_, record| !record.is_expired(now));
        before - self.nonces.len()
    }

    fn check_reservation(&self, reservation: &ReplayReservation) -> Result<(), StoreError> {
        if self.nonces.contains_key(&reservation.nonce.nonce) {
            return Err(StoreError::UniqueViolation {
                constraint: UniqueConstraint::Nonce,
                key: reservation.nonce.nonce.clone(),
            });
        }
        if self.intents.contains_key(&reservation.intent.tx_id) {
            return Err(StoreError::UniqueViolation {
                constraint: UniqueConstraint::IntentTransaction,
                key: reservation.intent.tx_id.clone(),
            });
        }
        Ok(())
    }

    fn apply_reservation(&mut self, reservation: ReplayReservation) {
        self.nonces
            .insert(reservation.nonce.nonce.clone(), reservation.nonce);
        self.intents
            .insert(reservation.intent.tx_id.clone(), reservation.intent);
    }

    fn check_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        if self.entry_by_tx.contains_key(&entry.transaction_id) {
            return Err(StoreError::UniqueViolation {
                constraint: UniqueConstraint::EntryTransaction,
                key: entry.transaction_id.clone(),
            });
        }
        Ok(())
    }

    fn apply_entry(&mut self, entry: LedgerEntry) {
        if !entry.company_delta.is_zero() {
            self.balances
                .entry(BalanceOwner::Company)
                .or_insert_with(|| BalanceAggregate::empty(BalanceOwner::Company))
                .apply(entry.company_delta, &entry);
        }
        if let Some(employee_id) = &entry.employee_id {
            if !entry.employee_delta.is_zero() {
                let owner = BalanceOwner::Employee(employee_id.clone());
                self.balances
                    .entry(owner.clone())
                    .or_insert_with(|| BalanceAggregate::empty(owner))
                    .apply(entry.employee_delta, &entry);
            }
        }
        self.entry_by_tx
            .insert(entry.transaction_id.clone(), self.entries.len());
        self.entries.push(entry);
    }
}

/// In-memory implementation of `ActorKeyStore`, `ReplayStore` and
/// `LedgerStore`.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    tables: Mutex<Tables>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a previously persisted key row as-is.
    pub fn restore_key(&self, key: ActorKey) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if tables
            .keys
            .iter()
            .any(|k| k.actor_id == key.actor_id && k.key_id == key.key_id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: UniqueConstraint::ActorKeyId,
                key: key.key_id,
            });
        }
        tables.keys.push(key);
        Ok(())
    }

    /// Load a previously persisted entry in commit order, replaying its
    /// balance deltas.
    pub fn restore_entry(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.check_entry(&entry)?;
        tables.apply_entry(entry);
        Ok(())
    }

    pub fn nonce_count(&self) -> usize {
        self.tables.lock().nonces.len()
    }
}

#[async_trait]
impl ActorKeyStore for InMemoryLedgerStore {
    async fn find_key(
        &self,
        actor_id: &str,
        key_id: &str,
        role: ActorRole,
    ) -> Result<Option<ActorKey>, StoreError> {
        Ok(self
            .tables
            .lock()
            .keys
            .iter()
            .find(|k| k.actor_id == actor_id && k.key_id == key_id && k.role == role)
            .cloned())
    }

    async fn latest_version(
        &self,
        actor_id: &str,
        role: ActorRole,
    ) -> Result<Option<u32>, StoreError> {
        Ok(self
            .tables
            .lock()
            .keys
            .iter()
            .filter(|k| k.actor_id == actor_id && k.role == role)
            .map(|k| k.key_version)
            .max())
    }

    async fn rotate_key(
        &self,
        mut key: ActorKey,
        revoked_at: DateTime<Utc>,
    ) -> Result<ActorKey, StoreError> {
        let mut tables = self.tables.lock();

        if tables
            .keys
            .iter()
            .any(|k| k.actor_id == key.actor_id && k.key_id == key.key_id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: UniqueConstraint::ActorKeyId,
                key: key.key_id,
            });
        }

        let mut latest = 0;
        for existing in tables
            .keys
            .iter_mut()
            .filter(|k| k.actor_id == key.actor_id && k.role == key.role)
        {
            latest = latest.max(existing.key_version);
            if existing.status == KeyStatus::Active {
                existing.status = KeyStatus::Revoked;
                existing.revoked_at = Some(revoked_at);
            }
        }

        key.key_version = latest + 1;
        key.status = KeyStatus::Active;
        key.revoked_at = None;
        tables.keys.push(key.clone());
        Ok(key)
    }

    async fn revoke_key(
        &self,
        actor_id: &str,
        key_id: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Option<ActorKey>, StoreError> {
        let mut tables = self.tables.lock();
        let Some(key) = tables
            .keys
            .iter_mut()
            .find(|k| k.actor_id == actor_id && k.key_id == key_id)
        else {
            return Ok(None);
        };
        if key.status == KeyStatus::Active {
            key.status = KeyStatus::Revoked;
            key.revoked_at = Some(revoked_at);
        }
        Ok(Some(key.clone()))
    }

    async fn list_keys(&self, actor_id: &str) -> Result<Vec<ActorKey>, StoreError> {
        Ok(self
            .tables
            .lock()
            .keys
            .iter()
            .filter(|k| k.actor_id == actor_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReplayStore for InMemoryLedgerStore {
    async fn nonce_exists(&self, nonce: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .nonces
            .get(nonce)
            .is_some_and(|record| !record.is_expired(now)))
    }

    async fn intent_exists(&self, tx_id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().intents.contains_key(tx_id))
    }

    async fn reserve(&self, reservation: ReplayReservation) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.purge_nonces(reservation.nonce.created_at);
        tables.check_reservation(&reservation)?;
        tables.apply_reservation(reservation);
        Ok(())
    }

    async fn purge_expired_nonces(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.tables.lock().purge_nonces(now))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn latest_active_entry(&self) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self
            .tables
            .lock()
            .entries
            .iter()
            .rev()
            .find(|e| e.crypto_status() == CryptoStatus::Active)
            .cloned())
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();

        if let Some(reservation) = &commit.replay {
            tables.purge_nonces(reservation.nonce.created_at);
            tables.check_reservation(reservation)?;
        }
        tables.check_entry(&commit.entry)?;

        if let Some(reservation) = commit.replay {
            tables.apply_reservation(reservation);
        }
        tables.apply_entry(commit.entry);
        Ok(())
    }

    async fn entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self
            .tables
            .lock()
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.tables.lock().entries.clone())
    }

    async fn balance(&self, owner: &BalanceOwner) -> Result<BalanceAggregate, StoreError> {
        Ok(self
            .tables
            .lock()
            .balances
            .get(owner)
            .cloned()
            .unwrap_or_else(|| BalanceAggregate::empty(owner.clone())))
    }
}
