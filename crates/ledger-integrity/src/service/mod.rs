//! # Ledger Integrity Service
//!
//! Application service layer that implements the `LedgerIntegrityApi` trait.
//!
//! ## Architecture
//!
//! This is the hexagonal "application service" that:
//! - Implements the inbound port (`LedgerIntegrityApi`)
//! - Uses the outbound ports (`ActorKeyStore`, `LedgerStore`, `TimeSource`)
//! - Wires the components together, leaf-first
//!
//! ```text
//! caller -> SignedIntentVerifier (ActorKeyRegistry + ReplayGuard)
//!        -> TransactionFactory (LedgerChain | LegacyCryptoBridge)
//!        -> LedgerStore
//! entry  -> IntegrityVerifier -> IntegrityReport
//! ```

pub mod chain;
pub mod factory;
pub mod integrity;
pub mod legacy;
pub mod registry;
pub mod replay;
pub mod verifier;

pub use chain::{LedgerChain, LinkVerification};
pub use factory::TransactionFactory;
pub use integrity::{AuditReport, IntegrityFailure, IntegrityReport, IntegrityVerifier};
pub use legacy::LegacyCryptoBridge;
pub use registry::ActorKeyRegistry;
pub use replay::ReplayGuard;
pub use verifier::SignedIntentVerifier;

use crate::domain::config::IntegrityConfig;
use crate::domain::errors::IntegrityError;
use crate::domain::intent::{CallerContext, IntentBinding, SignedEnvelope, VerifiedIntent};
use crate::domain::keys::{ActorKey, KeyIdentity, KeyRegistrationRequest};
use crate::domain::ledger::{BalanceAggregate, BalanceOwner, LedgerEntry, TransactionRequest};
use crate::ports::inbound::LedgerIntegrityApi;
use crate::ports::outbound::{ActorKeyStore, LedgerStore, TimeSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The wired integrity core.
pub struct LedgerIntegrityService {
    registry: ActorKeyRegistry,
    replay: ReplayGuard,
    verifier: SignedIntentVerifier,
    factory: TransactionFactory,
    integrity: IntegrityVerifier,
    store: Arc<dyn LedgerStore>,
}

impl LedgerIntegrityService {
    /// Wire every component over one store.
    ///
    /// The legacy key, if configured, is loaded here once and shared for the
    /// life of the service.
    pub fn new<S>(
        config: IntegrityConfig,
        store: Arc<S>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, IntegrityError>
    where
        S: ActorKeyStore + LedgerStore + 'static,
    {
        let legacy = config
            .legacy_key
            .as_ref()
            .map(LegacyCryptoBridge::load)
            .transpose()?
            .map(Arc::new);
        Ok(Self::with_legacy(config, store, clock, legacy))
    }

    /// Wire every component with an already loaded legacy bridge.
    pub fn with_legacy<S>(
        config: IntegrityConfig,
        store: Arc<S>,
        clock: Arc<dyn TimeSource>,
        legacy: Option<Arc<LegacyCryptoBridge>>,
    ) -> Self
    where
        S: ActorKeyStore + LedgerStore + 'static,
    {
        let config = Arc::new(config);
        let key_store: Arc<dyn ActorKeyStore> = store.clone();
        let ledger_store: Arc<dyn LedgerStore> = store.clone();

        let registry = ActorKeyRegistry::new(key_store, clock.clone());
        let replay = ReplayGuard::new(store, clock.clone(), config.nonce_ttl_secs);
        let verifier = SignedIntentVerifier::new(
            registry.clone(),
            replay.clone(),
            clock.clone(),
            config.freshness_window_secs,
        );
        let chain = LedgerChain::new(config.checksum_keys.clone(), ledger_store.clone());
        let integrity = IntegrityVerifier::new(
            registry.clone(),
            legacy.clone(),
            chain.clone(),
            ledger_store.clone(),
        );
        let factory = TransactionFactory::new(
            config.clone(),
            chain,
            legacy.clone(),
            ledger_store.clone(),
            clock,
        );

        info!(
            cutoff = ?config.migration_cutoff,
            legacy_key = legacy.as_ref().map(|l| l.fingerprint().to_string()),
            previous_checksum_key = config.checksum_keys.previous.is_some(),
            "Ledger integrity service initialized"
        );

        Self {
            registry,
            replay,
            verifier,
            factory,
            integrity,
            store: ledger_store,
        }
    }

    pub fn registry(&self) -> &ActorKeyRegistry {
        &self.registry
    }

    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay
    }

    pub fn integrity_verifier(&self) -> &IntegrityVerifier {
        &self.integrity
    }
}

#[async_trait]
impl LedgerIntegrityApi for LedgerIntegrityService {
    async fn register_key(
        &self,
        actor_id: &str,
        request: &KeyRegistrationRequest,
    ) -> Result<KeyIdentity, IntegrityError> {
        self.registry.register_request(actor_id, request).await
    }

    async fn revoke_key(&self, actor_id: &str, key_id: &str) -> Result<ActorKey, IntegrityError> {
        self.registry.revoke(actor_id, key_id).await
    }

    async fn list_keys(&self, actor_id: &str) -> Result<Vec<ActorKey>, IntegrityError> {
        self.registry.list(actor_id).await
    }

    async fn verify_intent(
        &self,
        envelope: &SignedEnvelope,
        caller: &CallerContext,
        binding: &IntentBinding,
    ) -> Result<VerifiedIntent, IntegrityError> {
        self.verifier.verify(envelope, caller, binding).await
    }

    async fn consume_intent(&self, intent: &VerifiedIntent) -> Result<(), IntegrityError> {
        self.replay.consume(intent).await
    }

    async fn record_transaction(
        &self,
        request: TransactionRequest,
        intent: Option<VerifiedIntent>,
    ) -> Result<LedgerEntry, IntegrityError> {
        self.factory.create(request, intent).await
    }

    async fn verify_entry(&self, entry_id: Uuid) -> Result<IntegrityReport, IntegrityError> {
        let entry = self
            .store
            .entry(entry_id)
            .await?
            .ok_or_else(|| IntegrityError::EntryNotFound(entry_id.to_string()))?;
        self.integrity.verify_entry(&entry).await
    }

    async fn audit_chain(&self) -> Result<AuditReport, IntegrityError> {
        self.integrity.audit_chain().await
    }

    async fn balance(&self, owner: &BalanceOwner) -> Result<BalanceAggregate, IntegrityError> {
        Ok(self.store.balance(owner).await?)
    }
}
