//! # Transaction Factory
//!
//! The single writer of ledger entries.
//!
//! ## Crypto Path Selection
//!
//! | Verified intent | Before cutoff | At/after cutoff |
//! |-----------------|---------------|-----------------|
//! | present | ACTIVE | ACTIVE |
//! | absent | LEGACY | `SignedIntentRequired` |
//!
//! ACTIVE writes run "read latest link, compute next link, commit" under one
//! writer gate, so two writers can never link to the same predecessor.

use crate::domain::canonical::content_hash;
use crate::domain::config::{IntegrityConfig, LEGACY_ALGORITHM};
use crate::domain::errors::IntegrityError;
use crate::domain::intent::VerifiedIntent;
use crate::domain::ledger::{legacy_payload, CryptoMode, LedgerEntry, TransactionRequest};
use crate::ports::outbound::{LedgerCommit, LedgerStore, TimeSource};
use crate::service::chain::LedgerChain;
use crate::service::legacy::LegacyCryptoBridge;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Creates and commits ledger entries.
pub struct TransactionFactory {
    config: Arc<IntegrityConfig>,
    chain: LedgerChain,
    legacy: Option<Arc<LegacyCryptoBridge>>,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn TimeSource>,
    writer: Mutex<()>,
}

impl TransactionFactory {
    pub fn new(
        config: Arc<IntegrityConfig>,
        chain: LedgerChain,
        legacy: Option<Arc<LegacyCryptoBridge>>,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            chain,
            legacy,
            store,
            clock,
            writer: Mutex::new(()),
        }
    }

    /// Create and persist one entry.
    ///
    /// # Errors
    /// * `MalformedTransaction` - request inconsistent
    /// * `SignedIntentRequired` - no intent at/after the migration cutoff
    /// * `AmountMismatch` / `TargetMismatch` - request differs from what was signed
    /// * `ReplayDetected` / `DuplicateTransaction` - lost a race on the replay keys
    /// * `Checksum` / `Storage` - internal failure; nothing was written
    pub async fn create(
        &self,
        request: TransactionRequest,
        intent: Option<VerifiedIntent>,
    ) -> Result<LedgerEntry, IntegrityError> {
        request.validate()?;
        let now = self.clock.now();

        match intent {
            Some(intent) => self.create_active(request, intent).await,
            None if self.config.intent_required_at(now) => {
                warn!(
                    tx_type = request.tx_type.as_str(),
                    "Unsigned write rejected after migration cutoff"
                );
                Err(IntegrityError::SignedIntentRequired)
            }
            None => self.create_legacy(request).await,
        }
    }

    async fn create_active(
        &self,
        request: TransactionRequest,
        intent: VerifiedIntent,
    ) -> Result<LedgerEntry, IntegrityError> {
        if let Some(signed) = intent.amount() {
            if signed != request.amount {
                return Err(IntegrityError::AmountMismatch {
                    expected: request.amount.normalize().to_string(),
                    actual: signed.normalize().to_string(),
                });
            }
        }
        let requested_contract = request.contract_id.as_deref();
        if let (Some(signed), Some(requested)) = (intent.target_id(), requested_contract) {
            if signed != requested {
                return Err(IntegrityError::TargetMismatch);
            }
        }
        if let Some(requested) = request.transaction_id.as_deref() {
            if requested != intent.tx_id() {
                return Err(IntegrityError::MalformedTransaction(
                    "transaction id differs from the signed intent".into(),
                ));
            }
        }

        let _gate = self.writer.lock().await;

        let previous_hash = self.chain.latest_hash().await?;
        let ledger_hmac = self.chain.link(intent.content_hash(), &previous_hash)?;

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            transaction_id: intent.tx_id().to_string(),
            tx_type: request.tx_type,
            amount: request.amount,
            currency: request.currency,
            employee_delta: request.employee_delta,
            company_delta: request.company_delta,
            employee_id: request.employee_id,
            contract_id: request.contract_id.or_else(|| intent.target_id().map(str::to_string)),
            description: request.description,
            created_at: self.clock.now(),
            integrity: CryptoMode::Active {
                payload_hash: intent.content_hash().to_string(),
                previous_hash,
                ledger_hmac,
                actor_id: intent.actor_id().to_string(),
                actor_role: intent.actor_role(),
                actor_key_id: intent.actor_key_id().to_string(),
                actor_signature: intent.signature().to_string(),
                nonce: intent.nonce().to_string(),
                intent_timestamp: intent.timestamp(),
            },
        };

        self.store
            .commit(LedgerCommit {
                entry: entry.clone(),
                replay: Some(intent.reservation().clone()),
            })
            .await
            .inspect_err(|e| {
                warn!(tx_id = %entry.transaction_id, error = %e, "Ledger commit failed")
            })?;

        info!(
            tx_id = %entry.transaction_id,
            actor_id = intent.actor_id(),
            key_id = intent.actor_key_id(),
            mode = "ACTIVE",
            amount = %entry.amount,
            "Ledger entry recorded"
        );
        Ok(entry)
    }

    async fn create_legacy(
        &self,
        request: TransactionRequest,
    ) -> Result<LedgerEntry, IntegrityError> {
        let transaction_id = request
            .transaction_id
            .clone()
            .unwrap_or_else(|| format!("TX-{}", Uuid::new_v4()));
        let created_at = self.clock.now();

        let payload_hash = content_hash(&legacy_payload(
            &transaction_id,
            request.tx_type,
            request.amount,
            request.employee_delta,
            request.company_delta,
            request.employee_id.as_deref(),
            request.contract_id.as_deref(),
            created_at,
        ));

        let company_signature = match self.legacy.as_deref() {
            Some(bridge) if bridge.can_sign() => Some(bridge.sign_legacy(&payload_hash)?),
            _ => {
                warn!(tx_id = %transaction_id, "No legacy signing key; entry stored unsigned");
                None
            }
        };

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            transaction_id,
            tx_type: request.tx_type,
            amount: request.amount,
            currency: request.currency,
            employee_delta: request.employee_delta,
            company_delta: request.company_delta,
            employee_id: request.employee_id,
            contract_id: request.contract_id,
            description: request.description,
            created_at,
            integrity: CryptoMode::Legacy {
                payload_hash,
                company_signature,
                algorithm: LEGACY_ALGORITHM.to_string(),
            },
        };

        self.store
            .commit(LedgerCommit {
                entry: entry.clone(),
                replay: None,
            })
            .await?;

        info!(
            tx_id = %entry.transaction_id,
            mode = "LEGACY",
            signed = !entry.integrity.is_unsigned(),
            amount = %entry.amount,
            "Ledger entry recorded"
        );
        Ok(entry)
    }
}
