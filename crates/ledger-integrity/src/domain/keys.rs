//! # Actor Keys
//!
//! Per-actor, per-role public keys and the registration DTOs.

use crate::domain::errors::IntegrityError;
use crate::domain::intent::ActorRole;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_crypto::Ed25519PublicKey;

/// The one signature scheme actor keys may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "Ed25519")]
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => "Ed25519",
        }
    }

    /// Accepts `Ed25519` / `EdDSA` in any case; everything else is refused.
    pub fn parse(tag: &str) -> Result<Self, IntegrityError> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "ED25519" | "EDDSA" => Ok(SignatureAlgorithm::Ed25519),
            _ => Err(IntegrityError::UnsupportedAlgorithm(tag.to_string())),
        }
    }
}

/// Key lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    Active,
    Revoked,
}

/// A registered actor key.
///
/// At most one ACTIVE key exists per (actor, role); (actor, keyId) is unique
/// across all statuses. Rows are superseded, never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorKey {
    pub actor_id: String,
    pub role: ActorRole,
    pub key_id: String,
    pub key_version: u32,
    pub public_key: Ed25519PublicKey,
    pub algorithm: SignatureAlgorithm,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ActorKey {
    pub fn identity(&self) -> KeyIdentity {
        KeyIdentity {
            key_id: self.key_id.clone(),
            actor_role: self.role,
            key_version: self.key_version,
        }
    }

    /// Whether the revocation timestamp (if any) is at or before `at`.
    pub fn revoked_by(&self, at: DateTime<Utc>) -> bool {
        self.revoked_at.is_some_and(|revoked| at >= revoked)
    }
}

/// Registration response: `{ keyId, actorRole, keyVersion }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyIdentity {
    pub key_id: String,
    pub actor_role: ActorRole,
    pub key_version: u32,
}

/// Public key as a JWK (`kty: OKP`, `crv: Ed25519`, `x`: base64url).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyJwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl PublicKeyJwk {
    pub fn from_public_key(key: &Ed25519PublicKey) -> Self {
        Self {
            kty: "OKP".to_string(),
            crv: Some("Ed25519".to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(key.as_bytes())),
            alg: Some("EdDSA".to_string()),
        }
    }

    /// Decode into an Ed25519 key. Non-OKP keys are an unsupported algorithm,
    /// not a malformed key.
    pub fn to_public_key(&self) -> Result<Ed25519PublicKey, IntegrityError> {
        if self.kty != "OKP" {
            return Err(IntegrityError::UnsupportedAlgorithm(self.kty.clone()));
        }
        match self.crv.as_deref() {
            Some("Ed25519") => {}
            other => {
                return Err(IntegrityError::UnsupportedAlgorithm(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        }
        let x = self
            .x
            .as_deref()
            .ok_or_else(|| IntegrityError::InvalidPublicKey("jwk is missing x".into()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(x.trim_end_matches('='))
            .map_err(|e| IntegrityError::InvalidPublicKey(e.to_string()))?;
        Ed25519PublicKey::from_slice(&bytes)
            .map_err(|e| IntegrityError::InvalidPublicKey(e.to_string()))
    }
}

/// Registration request: `{ keyId, actorRole, publicKeyJwk, keyVersion? }`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRegistrationRequest {
    pub key_id: String,
    pub actor_role: String,
    pub public_key_jwk: PublicKeyJwk,
    /// Advisory; when present it must equal the server-assigned version.
    #[serde(default)]
    pub key_version: Option<u32>,
    /// Defaults to Ed25519.
    #[serde(default)]
    pub algorithm: Option<String>,
}
