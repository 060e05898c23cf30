//! # Test Harness
//!
//! A wired service over the in-memory store and a manual clock, plus actors
//! that sign intents the way a client would.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use ledger_integrity::adapters::{FixedTimeSource, InMemoryLedgerStore};
use ledger_integrity::{
    content_hash, CallerContext, ChecksumKeys, IntegrityConfig, IntentAction, IntentBinding,
    KeyIdentity, KeyRegistrationRequest, LedgerEntry, LedgerIntegrityApi, LedgerIntegrityService,
    LedgerStore, LegacyCryptoBridge, PublicKeyJwk, SignedEnvelope, TimeSource, TransactionRequest,
    TransactionType,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shared_crypto::Ed25519KeyPair;

/// Checksum key used by every harness unless a test overrides it.
pub const CHECKSUM_KEY: [u8; 32] = [0x5a; 32];

pub fn config() -> IntegrityConfig {
    IntegrityConfig {
        checksum_keys: ChecksumKeys::new(CHECKSUM_KEY.to_vec()),
        ..IntegrityConfig::default()
    }
}

/// Random hex nonce, as a client would generate.
pub fn fresh_nonce() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

pub struct Harness {
    pub service: Arc<LedgerIntegrityService>,
    pub store: Arc<InMemoryLedgerStore>,
    pub clock: Arc<FixedTimeSource>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config(), None)
    }

    pub fn with_config(config: IntegrityConfig, legacy: Option<LegacyCryptoBridge>) -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let clock = Arc::new(FixedTimeSource::new(Utc::now()));
        let service = LedgerIntegrityService::with_legacy(
            config,
            store.clone(),
            clock.clone(),
            legacy.map(Arc::new),
        );
        Self {
            service: Arc::new(service),
            store,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Stored entries in commit order.
    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.store.entries().await.expect("in-memory store")
    }

    /// Register `actor`'s current key through the public API.
    pub async fn register(&self, actor: &Actor) -> KeyIdentity {
        self.service
            .register_key(&actor.id, &actor.registration())
            .await
            .expect("key registration")
    }

    /// Sign, verify and record a contract approval in one go.
    pub async fn approve(&self, actor: &Actor, tx_id: &str, contract: &str, amount: i64) {
        let payload = approval(actor, tx_id, contract, amount, &fresh_nonce(), self.now());
        let envelope = actor.sign(payload);
        let intent = self
            .service
            .verify_intent(&envelope, &actor.caller(), &approval_binding(contract, amount))
            .await
            .expect("intent verifies");
        self.service
            .record_transaction(contract_payment(tx_id, contract, amount), Some(intent))
            .await
            .expect("entry recorded");
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A signing identity: actor, role, and the key it currently signs with.
pub struct Actor {
    pub id: String,
    pub role: String,
    pub key_id: String,
    pub keypair: Ed25519KeyPair,
}

impl Actor {
    pub fn new(id: &str, role: &str, key_id: &str, seed: u8) -> Self {
        Self {
            id: id.to_string(),
            role: role.to_string(),
            key_id: key_id.to_string(),
            keypair: Ed25519KeyPair::from_seed([seed; 32]),
        }
    }

    /// Same actor and role, signing with a new key.
    pub fn rotated(&self, key_id: &str, seed: u8) -> Self {
        Self::new(&self.id, &self.role, key_id, seed)
    }

    pub fn registration(&self) -> KeyRegistrationRequest {
        KeyRegistrationRequest {
            key_id: self.key_id.clone(),
            actor_role: self.role.clone(),
            public_key_jwk: PublicKeyJwk::from_public_key(&self.keypair.public_key()),
            key_version: None,
            algorithm: None,
        }
    }

    /// Authenticated-session view of this actor.
    pub fn caller(&self) -> CallerContext {
        CallerContext::new(&self.id, [self.role.as_str()])
    }

    /// Sign the content hash of `payload` with this actor's key.
    pub fn sign(&self, payload: Value) -> SignedEnvelope {
        let hash = content_hash(&payload);
        SignedEnvelope {
            signature: self.keypair.sign(hash.as_bytes()).to_base64(),
            actor_key_id: self.key_id.clone(),
            payload,
        }
    }
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// CONTRACT_APPROVE payload as the client builds it.
pub fn approval(
    actor: &Actor,
    tx_id: &str,
    contract: &str,
    amount: i64,
    nonce: &str,
    at: DateTime<Utc>,
) -> Value {
    json!({
        "txId": tx_id,
        "actorId": actor.id,
        "actorRole": actor.role,
        "action": "CONTRACT_APPROVE",
        "contractId": contract,
        "amount": amount,
        "nonce": nonce,
        "timestamp": timestamp(at),
    })
}

pub fn approval_binding(contract: &str, amount: i64) -> IntentBinding {
    IntentBinding::action(IntentAction::ContractApprove)
        .with_target(contract)
        .with_amount(Decimal::from(amount))
}

/// Payment into the company account for an approved contract.
pub fn contract_payment(tx_id: &str, contract: &str, amount: i64) -> TransactionRequest {
    TransactionRequest::new(TransactionType::ContractPayment, Decimal::from(amount))
        .with_transaction_id(tx_id)
        .with_contract(contract)
        .with_company_delta(Decimal::from(amount))
        .with_description(format!("Contract {contract} approved"))
}

/// Unsigned deposit, as legacy callers write it.
pub fn deposit(tx_id: &str, amount: i64) -> TransactionRequest {
    TransactionRequest::new(TransactionType::Deposit, Decimal::from(amount))
        .with_transaction_id(tx_id)
        .with_company_delta(Decimal::from(amount))
}
