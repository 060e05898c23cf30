//! # Signed Intent Verifier
//!
//! Turns a client-signed envelope into a `VerifiedIntent`.
//!
//! ## Verification Steps
//!
//! 1. Structure: required fields present, `txId` and `nonce` non-empty
//! 2. Binding: action, actor, role, target and amount match the server's view
//! 3. Freshness: `|now - timestamp| <= window`
//! 4. Signature: canonical content hash, key resolved at the payload time
//! 5. Replay: nonce and transaction id unused
//!
//! Every step fails closed and no step writes. The replay rows are inserted
//! later, inside the same atomic unit as the ledger write (or by
//! `ReplayGuard::consume` for actions without one).

use crate::domain::canonical::content_hash;
use crate::domain::errors::{ErrorClass, IntegrityError};
use crate::domain::intent::{
    ActionIntent, ActorRole, CallerContext, IntentAction, IntentBinding, SignedEnvelope,
    SignedPayload, VerifiedIntent,
};
use crate::ports::outbound::TimeSource;
use crate::service::registry::ActorKeyRegistry;
use crate::service::replay::ReplayGuard;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared_crypto::Ed25519Signature;
use std::sync::Arc;
use tracing::{debug, warn};

/// Verifies signed intents against the key registry and replay guard.
#[derive(Clone)]
pub struct SignedIntentVerifier {
    registry: ActorKeyRegistry,
    replay: ReplayGuard,
    clock: Arc<dyn TimeSource>,
    freshness_window_secs: i64,
}

impl SignedIntentVerifier {
    pub fn new(
        registry: ActorKeyRegistry,
        replay: ReplayGuard,
        clock: Arc<dyn TimeSource>,
        freshness_window_secs: i64,
    ) -> Self {
        Self {
            registry,
            replay,
            clock,
            freshness_window_secs,
        }
    }

    /// Run all verification steps.
    ///
    /// # Errors
    /// * `MissingField` / `MalformedPayload` / `InvalidTimestamp` - client error
    /// * `ActionMismatch` / `ActorMismatch` / `RoleNotPermitted` /
    ///   `TargetMismatch` / `AmountMismatch` / `StaleTimestamp` /
    ///   `InvalidSignature` - forbidden
    /// * `ReplayDetected` / `DuplicateTransaction` - conflict
    pub async fn verify(
        &self,
        envelope: &SignedEnvelope,
        caller: &CallerContext,
        binding: &IntentBinding,
    ) -> Result<VerifiedIntent, IntegrityError> {
        // 1. Structure
        let payload = SignedPayload::parse(&envelope.payload)?;
        if envelope.actor_key_id.trim().is_empty() {
            return Err(IntegrityError::MissingField("actorKeyId"));
        }
        if envelope.signature.trim().is_empty() {
            return Err(IntegrityError::MissingField("signature"));
        }

        // 2. Binding
        let (action, role) = check_binding(&payload, caller, binding).inspect_err(|e| {
            warn!(
                tx_id = %payload.tx_id,
                actor_id = %caller.actor_id,
                error = %e,
                "Intent binding rejected"
            );
        })?;

        // 3. Freshness
        let now = self.clock.now();
        let timestamp = payload.parsed_timestamp()?;
        self.check_freshness(timestamp, now).inspect_err(|e| {
            warn!(tx_id = %payload.tx_id, error = %e, "Intent outside freshness window");
        })?;

        // 4. Signature
        let hash = content_hash(&envelope.payload);
        self.check_signature(
            &payload,
            role,
            &envelope.actor_key_id,
            &envelope.signature,
            &hash,
            timestamp,
        )
        .await?;

        // 5. Replay
        self.replay.check(&payload.nonce, &payload.tx_id).await?;

        let target_id = payload.contract_id.clone();
        let intent = ActionIntent {
            tx_id: payload.tx_id.clone(),
            actor_id: payload.actor_id.clone(),
            actor_role: role,
            action,
            target_id: target_id.clone(),
            content_hash: hash.clone(),
            nonce: payload.nonce.clone(),
            intent_timestamp: timestamp,
            created_at: now,
        };

        debug!(tx_id = %payload.tx_id, hash = &hash[..12], "Signed intent verified");

        Ok(VerifiedIntent {
            content_hash: hash,
            actor_id: payload.actor_id,
            actor_role: role,
            actor_key_id: envelope.actor_key_id.clone(),
            signature: envelope.signature.clone(),
            action,
            target_id,
            amount: payload.amount,
            tx_id: payload.tx_id,
            nonce: payload.nonce,
            timestamp,
            reservation: self.replay.reservation(intent),
        })
    }

    fn check_freshness(
        &self,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), IntegrityError> {
        let skew_ms = (now - timestamp).num_milliseconds().abs();
        if skew_ms > self.freshness_window_secs * 1000 {
            return Err(IntegrityError::StaleTimestamp {
                skew_secs: skew_ms / 1000,
            });
        }
        Ok(())
    }

    /// Every failure in this step surfaces as `InvalidSignature`; the detail
    /// is logged only.
    async fn check_signature(
        &self,
        payload: &SignedPayload,
        role: ActorRole,
        key_id: &str,
        signature_b64: &str,
        hash: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), IntegrityError> {
        let key = match self
            .registry
            .resolve(&payload.actor_id, key_id, role, timestamp)
            .await
        {
            Ok(key) => key,
            Err(e) if e.class() == ErrorClass::Internal => return Err(e),
            Err(e) => {
                warn!(
                    tx_id = %payload.tx_id,
                    actor_id = %payload.actor_id,
                    key_id,
                    reason = %e,
                    "Signing key unusable"
                );
                return Err(IntegrityError::InvalidSignature);
            }
        };

        let signature = Ed25519Signature::from_base64(signature_b64).map_err(|e| {
            warn!(tx_id = %payload.tx_id, key_id, reason = %e, "Signature not decodable");
            IntegrityError::InvalidSignature
        })?;

        key.public_key
            .verify(hash.as_bytes(), &signature)
            .map_err(|_| {
                warn!(
                    tx_id = %payload.tx_id,
                    actor_id = %payload.actor_id,
                    key_id,
                    "Signature verification failed"
                );
                IntegrityError::InvalidSignature
            })
    }
}

/// Binding checks, in order: action, actor, role, target, amount.
fn check_binding(
    payload: &SignedPayload,
    caller: &CallerContext,
    binding: &IntentBinding,
) -> Result<(IntentAction, ActorRole), IntegrityError> {
    let action = IntentAction::parse(&payload.action)
        .filter(|a| *a == binding.expected_action)
        .ok_or_else(|| IntegrityError::ActionMismatch {
            expected: binding.expected_action.to_string(),
            actual: payload.action.clone(),
        })?;

    if payload.actor_id != caller.actor_id {
        return Err(IntegrityError::ActorMismatch);
    }

    let role = ActorRole::normalize(&payload.actor_role)?;
    if !caller.roles.permits(role) {
        return Err(IntegrityError::RoleNotPermitted(role.to_string()));
    }

    if action.requires_target() || binding.expected_target.is_some() {
        match (&binding.expected_target, &payload.contract_id) {
            (Some(expected), Some(actual)) if expected == actual => {}
            _ => return Err(IntegrityError::TargetMismatch),
        }
    }

    if let Some(expected) = binding.expected_amount {
        if payload.amount != Some(expected) {
            return Err(IntegrityError::AmountMismatch {
                expected: expected.normalize().to_string(),
                actual: payload
                    .amount
                    .map(|a: Decimal| a.normalize().to_string())
                    .unwrap_or_else(|| "none".to_string()),
            });
        }
    }

    Ok((action, role))
}
