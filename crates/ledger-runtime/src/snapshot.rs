//! Ledger snapshot restore and audit.
//!
//! A snapshot is the JSON export of the two persisted tables the audit needs:
//! actor keys (all statuses) and ledger rows in commit order.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ledger_integrity::adapters::InMemoryLedgerStore;
use ledger_integrity::{
    ActorKey, AuditReport, IntegrityConfig, IntegrityReport, LedgerIntegrityApi,
    LedgerIntegrityService, LedgerRecord, TimeSource,
};

/// Exported key and ledger tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub keys: Vec<ActorKey>,
    /// Ledger rows, oldest first.
    #[serde(default)]
    pub records: Vec<LedgerRecord>,
}

impl LedgerSnapshot {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
    }
}

/// An actor key row the restore refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedKey {
    pub actor_id: String,
    pub key_id: String,
    pub reason: String,
}

/// Audit result: the chain audit over every restorable row, plus a report
/// for each row that could not be mapped or restored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOutcome {
    pub audit: AuditReport,
    pub rejected_rows: Vec<IntegrityReport>,
    pub rejected_keys: Vec<RejectedKey>,
}

impl AuditOutcome {
    pub fn is_clean(&self) -> bool {
        self.audit.is_clean() && self.rejected_rows.is_empty() && self.rejected_keys.is_empty()
    }
}

/// Restore `snapshot` into a fresh in-memory store and re-verify everything.
///
/// Rows the store refuses (duplicate key ids, repeated transaction ids) are
/// reported alongside the audit rather than failing it.
pub async fn audit_snapshot(
    config: IntegrityConfig,
    snapshot: LedgerSnapshot,
    clock: Arc<dyn TimeSource>,
) -> Result<AuditOutcome> {
    let store = Arc::new(InMemoryLedgerStore::new());

    let mut rejected_keys = Vec::new();
    for key in snapshot.keys {
        let (actor_id, key_id) = (key.actor_id.clone(), key.key_id.clone());
        if let Err(e) = store.restore_key(key) {
            warn!(%actor_id, %key_id, error = %e, "Actor key not restored");
            rejected_keys.push(RejectedKey {
                actor_id,
                key_id,
                reason: e.to_string(),
            });
        }
    }

    let mut malformed = Vec::new();
    let mut rejected_rows = Vec::new();
    let mut restored = 0usize;
    for record in snapshot.records {
        match record.clone().into_entry() {
            Ok(entry) => match store.restore_entry(entry) {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!(tx_id = %record.transaction_id, error = %e, "Ledger row not restored");
                    rejected_rows.push(IntegrityReport::rejected(&record, e.to_string()));
                }
            },
            Err(e) => {
                warn!(tx_id = %record.transaction_id, error = %e, "Unmappable ledger row");
                malformed.push(record);
            }
        }
    }
    info!(
        restored,
        malformed = malformed.len(),
        rejected = rejected_rows.len() + rejected_keys.len(),
        "Snapshot restored"
    );

    let service = LedgerIntegrityService::new(config, store, clock)
        .context("initializing integrity service")?;

    let audit = service.audit_chain().await.context("auditing ledger chain")?;
    for record in malformed {
        rejected_rows.push(service.integrity_verifier().verify_record(record).await?);
    }

    Ok(AuditOutcome {
        audit,
        rejected_rows,
        rejected_keys,
    })
}
