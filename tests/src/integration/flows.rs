//! # Integration Test Flows
//!
//! Key registration, signed approval and ledger write through the service
//! API, then re-verification of what was written.
//!
//! ## Flow Tested:
//!
//! 1. **Register**: actor publishes a public key for one role
//! 2. **Verify**: server checks the signed intent against the session
//! 3. **Record**: factory links the entry into the chain and consumes the nonce
//! 4. **Audit**: every entry re-verifies from stored fields alone

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use ledger_integrity::{
        BalanceOwner, CryptoMode, CryptoStatus, IntegrityError, KeyStatus, LedgerIntegrityApi,
        GENESIS_HASH,
    };
    use rust_decimal::Decimal;

    // =============================================================================
    // CONTRACT APPROVAL
    // =============================================================================

    /// Test: Approved contract writes one ACTIVE entry; resubmission is a replay
    #[tokio::test]
    async fn test_contract_approval_then_replay() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        let identity = h.register(&e1).await;
        assert_eq!(identity.key_version, 1);

        let envelope = e1.sign(approval(&e1, "TX1", "C1", 5000, "n1", h.now()));
        let binding = approval_binding("C1", 5000);

        let intent = h
            .service
            .verify_intent(&envelope, &e1.caller(), &binding)
            .await
            .unwrap();
        let entry = h
            .service
            .record_transaction(contract_payment("TX1", "C1", 5000), Some(intent))
            .await
            .unwrap();

        assert_eq!(entry.transaction_id, "TX1");
        assert_eq!(entry.amount, Decimal::from(5000));
        assert_eq!(entry.crypto_status(), CryptoStatus::Active);
        assert_eq!(entry.previous_hash(), Some(GENESIS_HASH));

        let company = h.service.balance(&BalanceOwner::Company).await.unwrap();
        assert_eq!(company.total, Decimal::from(5000));

        // the exact same envelope again
        let err = h
            .service
            .verify_intent(&envelope, &e1.caller(), &binding)
            .await
            .unwrap_err();
        assert_eq!(err, IntegrityError::ReplayDetected);

        let company = h.service.balance(&BalanceOwner::Company).await.unwrap();
        assert_eq!(company.total, Decimal::from(5000));

        let audit = h.service.audit_chain().await.unwrap();
        assert_eq!(audit.total, 1);
        assert!(audit.is_clean());
    }

    /// Test: Successive approvals form one unbroken chain
    #[tokio::test]
    async fn test_approvals_chain_in_commit_order() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        for i in 0..5 {
            h.approve(&e1, &format!("TX{i}"), &format!("C{i}"), 100 * (i + 1))
                .await;
        }

        let entries = h.entries().await;
        let mut previous = GENESIS_HASH.to_string();
        for entry in &entries {
            assert_eq!(entry.previous_hash(), Some(previous.as_str()));
            previous = entry.ledger_hmac().unwrap().to_string();
        }

        let company = h.service.balance(&BalanceOwner::Company).await.unwrap();
        assert_eq!(company.total, Decimal::from(1500));
        assert_eq!(company.last_entry_id, entries.last().map(|e| e.id));
        assert!(h.service.audit_chain().await.unwrap().is_clean());
    }

    /// Test: Single-entry verification by id reports the signing key
    #[tokio::test]
    async fn test_verify_entry_by_id() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;
        h.approve(&e1, "TX1", "C1", 250).await;

        let entry = h.entries().await.remove(0);
        let report = h.service.verify_entry(entry.id).await.unwrap();

        assert!(report.valid);
        assert_eq!(
            report.key_fingerprint,
            Some(e1.keypair.public_key().fingerprint())
        );
    }

    // =============================================================================
    // KEY ROTATION
    // =============================================================================

    /// Test: Rotation retires the old key for new intents but not for history
    #[tokio::test]
    async fn test_rotation_keeps_history_verifiable() {
        let h = Harness::new();
        let k1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&k1).await;
        h.approve(&k1, "TX1", "C1", 100).await;

        h.clock.advance(chrono::Duration::seconds(60));
        let k2 = k1.rotated("k2", 2);
        let identity = h.register(&k2).await;
        assert_eq!(identity.key_version, 2);

        // new intents under k1 are refused
        let stale_key = k1.sign(approval(&k1, "TX2", "C2", 200, &fresh_nonce(), h.now()));
        let err = h
            .service
            .verify_intent(&stale_key, &k1.caller(), &approval_binding("C2", 200))
            .await
            .unwrap_err();
        assert_eq!(err, IntegrityError::InvalidSignature);

        h.approve(&k2, "TX2", "C2", 200).await;

        let keys = h.service.list_keys("E1").await.unwrap();
        let status = |key_id: &str| {
            keys.iter()
                .find(|k| k.key_id == key_id)
                .map(|k| (k.status, k.key_version))
        };
        assert_eq!(status("k1"), Some((KeyStatus::Revoked, 1)));
        assert_eq!(status("k2"), Some((KeyStatus::Active, 2)));

        // TX1 was signed before k1's revocation and still verifies
        let audit = h.service.audit_chain().await.unwrap();
        assert_eq!(audit.total, 2);
        assert!(audit.is_clean());
    }

    /// Test: Explicit revocation stops new intents without a replacement
    #[tokio::test]
    async fn test_revoke_without_replacement() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;
        h.approve(&e1, "TX1", "C1", 100).await;

        h.clock.advance(chrono::Duration::seconds(5));
        let revoked = h.service.revoke_key("E1", "k1").await.unwrap();
        assert_eq!(revoked.status, KeyStatus::Revoked);

        let envelope = e1.sign(approval(&e1, "TX2", "C2", 100, &fresh_nonce(), h.now()));
        let err = h
            .service
            .verify_intent(&envelope, &e1.caller(), &approval_binding("C2", 100))
            .await
            .unwrap_err();
        assert_eq!(err, IntegrityError::InvalidSignature);

        assert!(h.service.audit_chain().await.unwrap().is_clean());
    }

    /// Test: One actor may hold a key per role, each versioned separately
    #[tokio::test]
    async fn test_keys_are_per_role() {
        let h = Harness::new();
        let client = Actor::new("E1", "CLIENT", "k-client", 1);
        let admin = Actor::new("E1", "ADMIN", "k-admin", 2);

        assert_eq!(h.register(&client).await.key_version, 1);
        assert_eq!(h.register(&admin).await.key_version, 1);

        let keys = h.service.list_keys("E1").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.status == KeyStatus::Active));
    }

    /// Test: Reusing a key id for the same actor is a conflict
    #[tokio::test]
    async fn test_duplicate_key_id_rejected() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        let err = h
            .service
            .register_key("E1", &e1.rotated("k1", 9).registration())
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrityError::KeyIdConflict(_)));
    }

    // =============================================================================
    // NON-LEDGER ACTIONS
    // =============================================================================

    /// Test: Consuming an intent without a ledger write still burns the nonce
    #[tokio::test]
    async fn test_consume_intent_without_entry() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        let payload = serde_json::json!({
            "txId": "TX-REJECT-1",
            "actorId": "E1",
            "actorRole": "CLIENT",
            "action": "CONTRACT_REJECT",
            "contractId": "C9",
            "nonce": "n-reject",
            "timestamp": timestamp(h.now()),
        });
        let envelope = e1.sign(payload);
        let binding = ledger_integrity::IntentBinding::action(
            ledger_integrity::IntentAction::ContractReject,
        )
        .with_target("C9");

        let intent = h
            .service
            .verify_intent(&envelope, &e1.caller(), &binding)
            .await
            .unwrap();
        h.service.consume_intent(&intent).await.unwrap();

        let err = h
            .service
            .verify_intent(&envelope, &e1.caller(), &binding)
            .await
            .unwrap_err();
        assert_eq!(err, IntegrityError::ReplayDetected);
        assert!(h.entries().await.is_empty());
        assert_eq!(h.service.audit_chain().await.unwrap().total, 0);
    }

    /// Test: ACTIVE entries carry the actor's identity
    #[tokio::test]
    async fn test_active_entry_fields() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;
        h.approve(&e1, "TX1", "C1", 42).await;

        let entry = h.entries().await.remove(0);
        match entry.integrity {
            CryptoMode::Active {
                actor_id,
                actor_key_id,
                ..
            } => {
                assert_eq!(actor_id, "E1");
                assert_eq!(actor_key_id, "k1");
            }
            other => panic!("expected ACTIVE entry, got {other:?}"),
        }
        assert_eq!(entry.contract_id.as_deref(), Some("C1"));
    }
}
