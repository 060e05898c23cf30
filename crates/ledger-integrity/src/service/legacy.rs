//! # Legacy Crypto Bridge
//!
//! Signs and verifies entries under the single company-wide key used before
//! per-actor keys existed.
//!
//! Only the current company key is trusted: an entry signed under an older
//! company key fails verification and is reported, not silently accepted.

use crate::adapters::secrets::read_legacy_pem;
use crate::domain::config::{LegacyKeySource, LEGACY_ALGORITHM};
use crate::domain::errors::IntegrityError;
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use tracing::{info, warn};

/// Company-wide legacy key, loaded once per process.
#[derive(Debug)]
pub struct LegacyCryptoBridge {
    public_key: Ed25519PublicKey,
    /// Absent when only the public half was provisioned.
    signing_key: Option<Ed25519KeyPair>,
    fingerprint: String,
}

impl LegacyCryptoBridge {
    /// Load from the configured source (inline PEM or secret file).
    pub fn load(source: &LegacyKeySource) -> Result<Self, IntegrityError> {
        let pem = read_legacy_pem(source)?;
        let bridge = Self::from_pem(&pem)?;
        info!(
            fingerprint = %bridge.fingerprint,
            can_sign = bridge.can_sign(),
            "Loaded legacy company key"
        );
        Ok(bridge)
    }

    /// Parse PKCS#8 private PEM (sign + verify) or SPKI public PEM (verify).
    pub fn from_pem(pem: &str) -> Result<Self, IntegrityError> {
        if let Ok(keypair) = Ed25519KeyPair::from_pkcs8_pem(pem) {
            return Ok(Self::from_keypair(keypair));
        }
        let public_key = Ed25519PublicKey::from_public_key_pem(pem)
            .map_err(|e| IntegrityError::LegacyKey(e.to_string()))?;
        Ok(Self::verify_only(public_key))
    }

    pub fn from_keypair(keypair: Ed25519KeyPair) -> Self {
        let public_key = keypair.public_key();
        Self {
            fingerprint: public_key.fingerprint(),
            public_key,
            signing_key: Some(keypair),
        }
    }

    pub fn verify_only(public_key: Ed25519PublicKey) -> Self {
        Self {
            fingerprint: public_key.fingerprint(),
            public_key,
            signing_key: None,
        }
    }

    pub fn can_sign(&self) -> bool {
        self.signing_key.is_some()
    }

    /// First 16 hex chars of SHA-256 over the public key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn algorithm(&self) -> &'static str {
        LEGACY_ALGORITHM
    }

    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public_key
    }

    /// Sign a content hash; returns base64.
    pub fn sign_legacy(&self, content_hash: &str) -> Result<String, IntegrityError> {
        let keypair = self
            .signing_key
            .as_ref()
            .ok_or_else(|| IntegrityError::LegacyKey("no private key loaded".into()))?;
        Ok(keypair.sign(content_hash.as_bytes()).to_base64())
    }

    /// Verify a base64 signature over a content hash under the current key.
    pub fn verify_legacy(&self, content_hash: &str, signature_b64: &str) -> bool {
        let Ok(signature) = Ed25519Signature::from_base64(signature_b64) else {
            warn!(fingerprint = %self.fingerprint, "Legacy signature not decodable");
            return false;
        };
        self.public_key
            .verify(content_hash.as_bytes(), &signature)
            .is_ok()
    }
}
