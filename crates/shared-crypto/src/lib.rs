//! # Shared Crypto - Ledger Integrity Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256, HMAC-SHA256 | Content hashes, ledger chain links |
//! | `signatures` | Ed25519 | Actor intents, legacy company signatures |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency when signing
//! - **HMAC-SHA256**: Constant-time tag comparison on verification
//! - Secret key material is zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{hmac_sha256_hex, sha256, sha256_hex, verify_hmac_sha256_hex, Hash};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
