//! # Integrity Verifier
//!
//! Read-side re-verification of persisted entries.
//!
//! - LEGACY: recompute the legacy payload hash, check the company signature
//! - ACTIVE: check the keyed-checksum link, resolve the signing key as of
//!   the intent time, check the actor signature over the stored hash
//!
//! Failures are reported in the returned `IntegrityReport`; one bad entry
//! never aborts an audit.

use crate::domain::chain::GENESIS_HASH;
use crate::domain::errors::IntegrityError;
use crate::domain::ledger::{
    legacy_content_hash, CryptoMode, CryptoStatus, LedgerEntry, LedgerRecord,
    SIGNATURE_VERSION_ACTIVE, SIGNATURE_VERSION_LEGACY,
};
use crate::ports::outbound::LedgerStore;
use crate::service::chain::{LedgerChain, LinkVerification};
use crate::service::legacy::LegacyCryptoBridge;
use crate::service::registry::ActorKeyRegistry;
use serde::Serialize;
use shared_crypto::Ed25519Signature;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Why an entry failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityFailure {
    /// Stored row could not be mapped to an entry.
    MalformedRecord(String),
    /// Legacy payload hash does not match the entry's fields.
    PayloadHashMismatch,
    /// Legacy entry stored without a company signature.
    UnsignedLegacy,
    /// No legacy key configured to check the signature with.
    LegacyKeyUnavailable,
    LegacySignatureInvalid,
    /// Stored previous hash is not the predecessor's link.
    PreviousHashMismatch,
    /// Keyed checksum does not verify under any configured key.
    ChainLinkMismatch,
    /// Signing key unknown or revoked at the intent time.
    ActorKeyUnresolved(String),
    ActorSignatureInvalid,
}

/// Verification outcome for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub entry_id: Option<Uuid>,
    pub transaction_id: String,
    pub crypto_status: CryptoStatus,
    pub signature_version: u8,
    pub valid: bool,
    /// Fingerprint of the key the signature verified under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_fingerprint: Option<String>,
    /// Set when the link verified only under the previous checksum key.
    pub previous_checksum_key: bool,
    pub failures: Vec<IntegrityFailure>,
}

impl IntegrityReport {
    fn new(entry: &LedgerEntry) -> Self {
        Self {
            entry_id: Some(entry.id),
            transaction_id: entry.transaction_id.clone(),
            crypto_status: entry.crypto_status(),
            signature_version: entry.integrity.signature_version(),
            valid: true,
            key_fingerprint: None,
            previous_checksum_key: false,
            failures: Vec::new(),
        }
    }

    /// Report for a stored row that never became an entry.
    pub fn rejected(record: &LedgerRecord, reason: impl Into<String>) -> Self {
        let crypto_status = record.classify();
        Self {
            entry_id: record.id,
            transaction_id: record.transaction_id.clone(),
            crypto_status,
            signature_version: match crypto_status {
                CryptoStatus::Active => SIGNATURE_VERSION_ACTIVE,
                CryptoStatus::Legacy => SIGNATURE_VERSION_LEGACY,
            },
            valid: false,
            key_fingerprint: None,
            previous_checksum_key: false,
            failures: vec![IntegrityFailure::MalformedRecord(reason.into())],
        }
    }

    fn fail(&mut self, failure: IntegrityFailure) {
        self.valid = false;
        self.failures.push(failure);
    }
}

/// Outcome of a whole-ledger audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub active: usize,
    pub legacy: usize,
    pub entries: Vec<IntegrityReport>,
}

impl AuditReport {
    fn push(&mut self, report: IntegrityReport) {
        self.total += 1;
        if report.valid {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }
        match report.crypto_status {
            CryptoStatus::Active => self.active += 1,
            CryptoStatus::Legacy => self.legacy += 1,
        }
        self.entries.push(report);
    }

    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }

    pub fn invalid_entries(&self) -> impl Iterator<Item = &IntegrityReport> {
        self.entries.iter().filter(|r| !r.valid)
    }
}

/// Re-verifies entries produced by either crypto path.
#[derive(Clone)]
pub struct IntegrityVerifier {
    registry: ActorKeyRegistry,
    legacy: Option<Arc<LegacyCryptoBridge>>,
    chain: LedgerChain,
    store: Arc<dyn LedgerStore>,
}

impl IntegrityVerifier {
    pub fn new(
        registry: ActorKeyRegistry,
        legacy: Option<Arc<LegacyCryptoBridge>>,
        chain: LedgerChain,
        store: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            registry,
            legacy,
            chain,
            store,
        }
    }

    /// Verify one entry in isolation: its own link, not its position.
    pub async fn verify_entry(
        &self,
        entry: &LedgerEntry,
    ) -> Result<IntegrityReport, IntegrityError> {
        let mut report = IntegrityReport::new(entry);
        match &entry.integrity {
            CryptoMode::Legacy { .. } => self.check_legacy(entry, &mut report),
            CryptoMode::Active {
                payload_hash,
                previous_hash,
                ledger_hmac,
                ..
            } => {
                match self.chain.verify_link(payload_hash, previous_hash, ledger_hmac) {
                    LinkVerification::Mismatch => {
                        report.fail(IntegrityFailure::ChainLinkMismatch)
                    }
                    LinkVerification::Previous => report.previous_checksum_key = true,
                    LinkVerification::Current => {}
                }
                self.check_actor_signature(entry, &mut report).await?;
            }
        }
        log_report(&report);
        Ok(report)
    }

    /// Verify a persisted row; a row that cannot be mapped is reported invalid.
    pub async fn verify_record(
        &self,
        record: LedgerRecord,
    ) -> Result<IntegrityReport, IntegrityError> {
        match record.clone().into_entry() {
            Ok(entry) => self.verify_entry(&entry).await,
            Err(e) => {
                let report = IntegrityReport::rejected(&record, e.to_string());
                log_report(&report);
                Ok(report)
            }
        }
    }

    /// Verify entries in commit order, carrying the recomputed link forward.
    ///
    /// Because each ACTIVE entry is checked against the link recomputed for
    /// its predecessor, altering entry k invalidates k and every ACTIVE
    /// entry after it.
    pub async fn audit_entries(
        &self,
        entries: &[LedgerEntry],
    ) -> Result<AuditReport, IntegrityError> {
        let mut audit = AuditReport::default();
        let mut carried = GENESIS_HASH.to_string();

        for entry in entries {
            let mut report = IntegrityReport::new(entry);
            match &entry.integrity {
                CryptoMode::Legacy { .. } => self.check_legacy(entry, &mut report),
                CryptoMode::Active {
                    payload_hash,
                    previous_hash,
                    ledger_hmac,
                    ..
                } => {
                    if *previous_hash != carried {
                        report.fail(IntegrityFailure::PreviousHashMismatch);
                    }
                    let (link, verification) =
                        self.chain.recompute(payload_hash, &carried, ledger_hmac);
                    match verification {
                        LinkVerification::Mismatch => {
                            report.fail(IntegrityFailure::ChainLinkMismatch)
                        }
                        LinkVerification::Previous => report.previous_checksum_key = true,
                        LinkVerification::Current => {}
                    }
                    carried = link;
                    self.check_actor_signature(entry, &mut report).await?;
                }
            }
            log_report(&report);
            audit.push(report);
        }

        info!(
            total = audit.total,
            valid = audit.valid,
            invalid = audit.invalid,
            "Ledger audit complete"
        );
        Ok(audit)
    }

    /// Audit every stored entry.
    pub async fn audit_chain(&self) -> Result<AuditReport, IntegrityError> {
        let entries = self.store.entries().await?;
        self.audit_entries(&entries).await
    }

    fn check_legacy(&self, entry: &LedgerEntry, report: &mut IntegrityReport) {
        let CryptoMode::Legacy {
            payload_hash,
            company_signature,
            ..
        } = &entry.integrity
        else {
            return;
        };

        if legacy_content_hash(entry) != *payload_hash {
            report.fail(IntegrityFailure::PayloadHashMismatch);
        }
        let Some(signature) = company_signature else {
            report.fail(IntegrityFailure::UnsignedLegacy);
            return;
        };
        let Some(bridge) = self.legacy.as_deref() else {
            report.fail(IntegrityFailure::LegacyKeyUnavailable);
            return;
        };
        if bridge.verify_legacy(payload_hash, signature) {
            report.key_fingerprint = Some(bridge.fingerprint().to_string());
        } else {
            report.fail(IntegrityFailure::LegacySignatureInvalid);
        }
    }

    async fn check_actor_signature(
        &self,
        entry: &LedgerEntry,
        report: &mut IntegrityReport,
    ) -> Result<(), IntegrityError> {
        let CryptoMode::Active {
            payload_hash,
            actor_id,
            actor_role,
            actor_key_id,
            actor_signature,
            intent_timestamp,
            ..
        } = &entry.integrity
        else {
            return Ok(());
        };

        let key = match self
            .registry
            .resolve_historical(actor_id, actor_key_id, *actor_role, *intent_timestamp)
            .await
        {
            Ok(key) => key,
            Err(IntegrityError::Storage(message)) => return Err(IntegrityError::Storage(message)),
            Err(e) => {
                report.fail(IntegrityFailure::ActorKeyUnresolved(e.to_string()));
                return Ok(());
            }
        };

        let verified = Ed25519Signature::from_base64(actor_signature)
            .ok()
            .is_some_and(|sig| key.public_key.verify(payload_hash.as_bytes(), &sig).is_ok());
        if verified {
            report.key_fingerprint = Some(key.public_key.fingerprint());
        } else {
            report.fail(IntegrityFailure::ActorSignatureInvalid);
        }
        Ok(())
    }
}

fn log_report(report: &IntegrityReport) {
    if !report.valid {
        warn!(
            tx_id = %report.transaction_id,
            mode = ?report.crypto_status,
            failures = ?report.failures,
            "Ledger entry failed integrity check"
        );
    }
}
