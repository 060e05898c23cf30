//! # Actor Key Registry
//!
//! Registers, rotates and resolves per-actor, per-role public keys.
//!
//! ## Invariants
//!
//! - At most one ACTIVE key per (actor, role)
//! - (actor, keyId) is unique across all statuses
//! - Registration revokes the previous ACTIVE key in the same unit as the insert

use crate::domain::errors::IntegrityError;
use crate::domain::intent::ActorRole;
use crate::domain::keys::{
    ActorKey, KeyIdentity, KeyRegistrationRequest, KeyStatus, SignatureAlgorithm,
};
use crate::ports::outbound::{ActorKeyStore, TimeSource};
use chrono::{DateTime, Utc};
use shared_crypto::Ed25519PublicKey;
use std::sync::Arc;
use tracing::{debug, info};

/// Key registry over an `ActorKeyStore`.
#[derive(Clone)]
pub struct ActorKeyRegistry {
    store: Arc<dyn ActorKeyStore>,
    clock: Arc<dyn TimeSource>,
}

impl ActorKeyRegistry {
    pub fn new(store: Arc<dyn ActorKeyStore>, clock: Arc<dyn TimeSource>) -> Self {
        Self { store, clock }
    }

    /// Register a new ACTIVE key for (actor, role), revoking the previous one.
    ///
    /// # Errors
    /// * `UnsupportedAlgorithm` - `algorithm` is not Ed25519
    /// * `KeyIdConflict` - (actor, keyId) already registered
    pub async fn register(
        &self,
        actor_id: &str,
        role: ActorRole,
        key_id: &str,
        public_key: Ed25519PublicKey,
        algorithm: &str,
    ) -> Result<KeyIdentity, IntegrityError> {
        let algorithm = SignatureAlgorithm::parse(algorithm)?;
        if actor_id.trim().is_empty() {
            return Err(IntegrityError::MissingField("actorId"));
        }
        if key_id.trim().is_empty() {
            return Err(IntegrityError::MissingField("keyId"));
        }

        let now = self.clock.now();
        let key = ActorKey {
            actor_id: actor_id.to_string(),
            role,
            key_id: key_id.to_string(),
            key_version: 0,
            public_key,
            algorithm,
            status: KeyStatus::Active,
            created_at: now,
            revoked_at: None,
        };

        let stored = self.store.rotate_key(key, now).await?;
        info!(
            actor_id = %stored.actor_id,
            role = %stored.role,
            key_id = %stored.key_id,
            key_version = stored.key_version,
            fingerprint = %stored.public_key.fingerprint(),
            "Registered actor key"
        );
        Ok(stored.identity())
    }

    /// Register from the wire request `{ keyId, actorRole, publicKeyJwk, keyVersion? }`.
    ///
    /// A client-declared `keyVersion` is advisory: when present it must
    /// equal the version the server is about to assign.
    pub async fn register_request(
        &self,
        actor_id: &str,
        request: &KeyRegistrationRequest,
    ) -> Result<KeyIdentity, IntegrityError> {
        let role = ActorRole::normalize(&request.actor_role)?;
        let algorithm = request
            .algorithm
            .as_deref()
            .unwrap_or(SignatureAlgorithm::Ed25519.as_str());
        SignatureAlgorithm::parse(algorithm)?;
        let public_key = request.public_key_jwk.to_public_key()?;

        if let Some(declared) = request.key_version {
            let next = self
                .store
                .latest_version(actor_id, role)
                .await?
                .map_or(1, |v| v + 1);
            if declared != next {
                return Err(IntegrityError::KeyVersionMismatch {
                    expected: next,
                    actual: declared,
                });
            }
        }

        self.register(actor_id, role, &request.key_id, public_key, algorithm)
            .await
    }

    /// Resolve the key a new signature must verify under.
    ///
    /// # Errors
    /// * `KeyNotFound` - no row for (actor, keyId, role)
    /// * `KeyNotActive` - row is not ACTIVE
    /// * `KeyRevoked` - `at` is at or after the revocation timestamp
    pub async fn resolve(
        &self,
        actor_id: &str,
        key_id: &str,
        role: ActorRole,
        at: DateTime<Utc>,
    ) -> Result<ActorKey, IntegrityError> {
        let key = self.find(actor_id, key_id, role).await?;
        if key.status != KeyStatus::Active {
            return Err(IntegrityError::KeyNotActive);
        }
        if key.revoked_by(at) {
            return Err(IntegrityError::KeyRevoked);
        }
        Ok(key)
    }

    /// Resolve the key a stored signature was made under.
    ///
    /// A key rotated away after `at` was still valid when it signed, so a
    /// REVOKED row is accepted as long as its revocation is later than `at`.
    pub async fn resolve_historical(
        &self,
        actor_id: &str,
        key_id: &str,
        role: ActorRole,
        at: DateTime<Utc>,
    ) -> Result<ActorKey, IntegrityError> {
        let key = self.find(actor_id, key_id, role).await?;
        match (key.status, key.revoked_at) {
            (KeyStatus::Revoked, None) => Err(IntegrityError::KeyNotActive),
            _ if key.revoked_by(at) => Err(IntegrityError::KeyRevoked),
            _ => Ok(key),
        }
    }

    /// Revoke one key without registering a replacement.
    pub async fn revoke(&self, actor_id: &str, key_id: &str) -> Result<ActorKey, IntegrityError> {
        let now = self.clock.now();
        let key = self
            .store
            .revoke_key(actor_id, key_id, now)
            .await?
            .ok_or(IntegrityError::KeyNotFound)?;
        info!(actor_id, key_id, "Revoked actor key");
        Ok(key)
    }

    /// Every key ever registered for `actor_id`.
    pub async fn list(&self, actor_id: &str) -> Result<Vec<ActorKey>, IntegrityError> {
        Ok(self.store.list_keys(actor_id).await?)
    }

    async fn find(
        &self,
        actor_id: &str,
        key_id: &str,
        role: ActorRole,
    ) -> Result<ActorKey, IntegrityError> {
        self.store
            .find_key(actor_id, key_id, role)
            .await?
            .ok_or_else(|| {
                debug!(actor_id, key_id, role = %role, "Actor key lookup missed");
                IntegrityError::KeyNotFound
            })
    }
}
