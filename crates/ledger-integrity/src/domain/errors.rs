//! # Domain Errors
//!
//! Error types for the ledger integrity core.
//!
//! ## Design Principles
//!
//! - Each variant belongs to exactly one caller-facing class (`ErrorClass`)
//! - Key lookup failures never leak through the intent verifier; they are
//!   collapsed into `InvalidSignature` before reaching the caller
//! - No panics in domain logic (use Result instead)

use crate::ports::outbound::{StoreError, UniqueConstraint};
use thiserror::Error;

/// Caller-facing error class, mapped by the transport layer to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input or missing mandatory intent (4xx, not auth related).
    ClientError,
    /// Binding mismatch, stale timestamp, bad signature (403).
    Forbidden,
    /// Replay or duplicate transaction id (409).
    Conflict,
    /// Storage or configuration failure.
    Internal,
}

/// Errors that can occur in the integrity core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    // -------------------------------------------------------------------------
    // Malformed input
    // -------------------------------------------------------------------------
    /// A required payload or envelope field is absent or empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A payload field has the wrong JSON type or an unparseable value.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Payload timestamp is not ISO-8601.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Transaction request is internally inconsistent.
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    /// No ledger entry with the requested identifier.
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    /// Post-cutoff write attempted without a verified signed intent.
    #[error("A signed intent is required for this transaction")]
    SignedIntentRequired,

    // -------------------------------------------------------------------------
    // Binding / authorization
    // -------------------------------------------------------------------------
    /// Payload action differs from the action the server expects.
    #[error("Action mismatch: expected {expected}, got {actual}")]
    ActionMismatch { expected: String, actual: String },

    /// Payload actor differs from the authenticated caller.
    #[error("Actor mismatch")]
    ActorMismatch,

    /// Caller does not hold the role claimed in the payload.
    #[error("Role not permitted: {0}")]
    RoleNotPermitted(String),

    /// Target id missing or different from the expected target.
    #[error("Target mismatch")]
    TargetMismatch,

    /// Signed amount differs from the expected amount.
    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: String, actual: String },

    /// Payload timestamp outside the freshness window.
    #[error("Stale or future-dated intent ({skew_secs}s from server time)")]
    StaleTimestamp { skew_secs: i64 },

    /// Signature invalid, or the signing key is unknown/revoked.
    #[error("Invalid signature")]
    InvalidSignature,

    // -------------------------------------------------------------------------
    // Replay
    // -------------------------------------------------------------------------
    /// The nonce has already been consumed.
    #[error("Replay detected: nonce already used")]
    ReplayDetected,

    /// The transaction id has already been processed.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    // -------------------------------------------------------------------------
    // Actor key registry
    // -------------------------------------------------------------------------
    /// No key row for (actor, keyId, role).
    #[error("Actor key not found")]
    KeyNotFound,

    /// Key row exists but is not ACTIVE.
    #[error("Actor key is not active")]
    KeyNotActive,

    /// Key was revoked at or before the requested instant.
    #[error("Actor key revoked")]
    KeyRevoked,

    /// Registration named an algorithm other than Ed25519.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// (actor, keyId) is already registered.
    #[error("Key id already registered: {0}")]
    KeyIdConflict(String),

    /// Submitted key material cannot be decoded.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Client-declared key version disagrees with the server-assigned one.
    #[error("Key version mismatch: expected {expected}, got {actual}")]
    KeyVersionMismatch { expected: u32, actual: u32 },

    // -------------------------------------------------------------------------
    // Infrastructure
    // -------------------------------------------------------------------------
    /// Legacy company key could not be loaded or parsed.
    #[error("Legacy key unavailable: {0}")]
    LegacyKey(String),

    /// Keyed checksum could not be computed (missing/empty key).
    #[error("Ledger checksum failure: {0}")]
    Checksum(String),

    /// Backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl IntegrityError {
    /// Caller-facing class of this error.
    pub fn class(&self) -> ErrorClass {
        use IntegrityError::*;
        match self {
            MissingField(_)
            | MalformedPayload(_)
            | InvalidTimestamp(_)
            | MalformedTransaction(_)
            | EntryNotFound(_)
            | SignedIntentRequired
            | UnsupportedAlgorithm(_)
            | InvalidPublicKey(_)
            | KeyVersionMismatch { .. } => ErrorClass::ClientError,

            ActionMismatch { .. }
            | ActorMismatch
            | RoleNotPermitted(_)
            | TargetMismatch
            | AmountMismatch { .. }
            | StaleTimestamp { .. }
            | InvalidSignature
            | KeyNotFound
            | KeyNotActive
            | KeyRevoked => ErrorClass::Forbidden,

            ReplayDetected | DuplicateTransaction(_) | KeyIdConflict(_) => ErrorClass::Conflict,

            LegacyKey(_) | Checksum(_) | Storage(_) => ErrorClass::Internal,
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Key lookup failures read exactly like a bad signature, and internal
    /// failures carry no detail.
    pub fn public_message(&self) -> String {
        match self {
            IntegrityError::KeyNotFound
            | IntegrityError::KeyNotActive
            | IntegrityError::KeyRevoked => IntegrityError::InvalidSignature.to_string(),
            e if e.class() == ErrorClass::Internal => "Internal integrity error".to_string(),
            e => e.to_string(),
        }
    }
}

impl From<StoreError> for IntegrityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation {
                constraint: UniqueConstraint::Nonce,
                ..
            } => IntegrityError::ReplayDetected,
            StoreError::UniqueViolation {
                constraint:
                    UniqueConstraint::IntentTransaction | UniqueConstraint::EntryTransaction,
                key,
            } => IntegrityError::DuplicateTransaction(key),
            StoreError::UniqueViolation {
                constraint: UniqueConstraint::ActorKeyId,
                key,
            } => IntegrityError::KeyIdConflict(key),
            StoreError::Backend(message) => IntegrityError::Storage(message),
        }
    }
}
