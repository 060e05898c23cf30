//! # Ledger Integrity Core
//!
//! Authenticates who authorized each financial ledger write, prevents replay
//! of authorizations, and makes stored history tamper-evident.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Entities, canonical hashing, chain arithmetic
//! - **Ports Layer** (`ports/`): Trait definitions for inbound/outbound interfaces
//! - **Service Layer** (`service/`): The seven components and the wired facade
//! - **Adapters Layer** (`adapters/`): In-memory store, clocks, secret loading
//!
//! ## Crypto Modes
//!
//! - **LEGACY** (signature version 1): payload hash plus an optional company
//!   signature under one shared key
//! - **ACTIVE** (signature version 2): per-actor signed intent, nonce, and a
//!   keyed checksum linking the entry to its predecessor
//!
//! ## Security Notes
//!
//! - **Fail closed**: any verification step that cannot complete rejects
//! - **Single use**: a nonce or transaction id is consumed at most once
//! - **Tamper cascade**: editing entry k invalidates the link of every entry after k

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::canonical::{canonical_json, content_hash};
pub use domain::chain::GENESIS_HASH;
pub use domain::config::{ChecksumKeys, ConfigError, IntegrityConfig, LegacyKeySource};
pub use domain::errors::{ErrorClass, IntegrityError};
pub use domain::intent::{
    ActorRole, CallerContext, IntentAction, IntentBinding, RoleSet, SignedEnvelope,
    SignedPayload, VerifiedIntent,
};
pub use domain::keys::{
    ActorKey, KeyIdentity, KeyRegistrationRequest, KeyStatus, PublicKeyJwk, SignatureAlgorithm,
};
pub use domain::ledger::{
    BalanceAggregate, BalanceOwner, CryptoMode, CryptoStatus, LedgerEntry, LedgerRecord,
    TransactionRequest, TransactionType,
};
pub use ports::inbound::LedgerIntegrityApi;
pub use ports::outbound::{ActorKeyStore, LedgerStore, ReplayStore, StoreError, TimeSource};
pub use service::{
    ActorKeyRegistry, AuditReport, IntegrityFailure, IntegrityReport, IntegrityVerifier,
    LedgerChain, LedgerIntegrityService, LegacyCryptoBridge, ReplayGuard, SignedIntentVerifier,
    TransactionFactory,
};
