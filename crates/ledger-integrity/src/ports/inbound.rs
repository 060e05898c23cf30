//! # Inbound Ports (Driving Ports / API)
//!
//! The public API of the integrity core, as seen by request handlers.

use crate::domain::errors::IntegrityError;
use crate::domain::intent::{CallerContext, IntentBinding, SignedEnvelope, VerifiedIntent};
use crate::domain::keys::{ActorKey, KeyIdentity, KeyRegistrationRequest};
use crate::domain::ledger::{BalanceAggregate, BalanceOwner, LedgerEntry, TransactionRequest};
use crate::service::integrity::{AuditReport, IntegrityReport};
use async_trait::async_trait;
use uuid::Uuid;

/// Primary ledger integrity API.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait LedgerIntegrityApi: Send + Sync {
    // =========================================================================
    // Actor keys
    // =========================================================================

    /// Register (or rotate to) a new key for the authenticated actor.
    async fn register_key(
        &self,
        actor_id: &str,
        request: &KeyRegistrationRequest,
    ) -> Result<KeyIdentity, IntegrityError>;

    /// Revoke one key without a replacement.
    async fn revoke_key(&self, actor_id: &str, key_id: &str) -> Result<ActorKey, IntegrityError>;

    async fn list_keys(&self, actor_id: &str) -> Result<Vec<ActorKey>, IntegrityError>;

    // =========================================================================
    // Intents
    // =========================================================================

    /// Verify a signed envelope against the caller and the expected binding.
    ///
    /// Nothing is reserved; pass the result to `record_transaction` or
    /// `consume_intent`.
    async fn verify_intent(
        &self,
        envelope: &SignedEnvelope,
        caller: &CallerContext,
        binding: &IntentBinding,
    ) -> Result<VerifiedIntent, IntegrityError>;

    /// Consume an intent for an action that writes no ledger entry.
    async fn consume_intent(&self, intent: &VerifiedIntent) -> Result<(), IntegrityError>;

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Create one ledger entry, ACTIVE when an intent is supplied.
    async fn record_transaction(
        &self,
        request: TransactionRequest,
        intent: Option<VerifiedIntent>,
    ) -> Result<LedgerEntry, IntegrityError>;

    /// Re-verify one stored entry.
    ///
    /// # Errors
    /// * `EntryNotFound` - no entry with this id
    async fn verify_entry(&self, entry_id: Uuid) -> Result<IntegrityReport, IntegrityError>;

    /// Re-verify the whole ledger in commit order.
    async fn audit_chain(&self) -> Result<AuditReport, IntegrityError>;

    async fn balance(&self, owner: &BalanceOwner) -> Result<BalanceAggregate, IntegrityError>;
}
