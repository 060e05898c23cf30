//! # Legacy to Active Migration
//!
//! Before the cutoff, unsigned writes take the legacy path under the company
//! key. After it, every write must carry a verified intent. Both kinds of
//! entry coexist in one ledger and audit together.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use chrono::{Duration, Utc};
    use ledger_integrity::{
        BalanceOwner, CryptoMode, CryptoStatus, IntegrityConfig, IntegrityError,
        IntegrityFailure, LedgerIntegrityApi, LegacyCryptoBridge, GENESIS_HASH,
    };
    use rust_decimal::Decimal;
    use shared_crypto::Ed25519KeyPair;

    fn company_key() -> LegacyCryptoBridge {
        LegacyCryptoBridge::from_keypair(Ed25519KeyPair::from_seed([0xc0; 32]))
    }

    /// Harness whose migration cutoff is one hour after its start time.
    fn harness_with_cutoff() -> Harness {
        let start = Utc::now();
        let config = IntegrityConfig {
            migration_cutoff: Some(start + Duration::hours(1)),
            ..config()
        };
        let h = Harness::with_config(config, Some(company_key()));
        h.clock.set(start);
        h
    }

    /// Test: Unsigned writes are legacy before the cutoff and refused after
    #[tokio::test]
    async fn test_cutoff_switches_write_path() {
        let h = harness_with_cutoff();

        let legacy = h
            .service
            .record_transaction(deposit("DEP-1", 1000), None)
            .await
            .unwrap();
        assert_eq!(legacy.crypto_status(), CryptoStatus::Legacy);
        assert!(!legacy.integrity.is_unsigned());

        h.clock.advance(Duration::hours(2));
        let err = h
            .service
            .record_transaction(deposit("DEP-2", 1000), None)
            .await
            .unwrap_err();
        assert_eq!(err, IntegrityError::SignedIntentRequired);

        let company = h.service.balance(&BalanceOwner::Company).await.unwrap();
        assert_eq!(company.total, Decimal::from(1000));
    }

    /// Test: Legacy and active entries audit together; the chain starts at
    /// the first ACTIVE entry
    #[tokio::test]
    async fn test_mixed_ledger_audits_clean() {
        let h = harness_with_cutoff();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        h.service
            .record_transaction(deposit("DEP-1", 1000), None)
            .await
            .unwrap();
        h.service
            .record_transaction(deposit("DEP-2", 500), None)
            .await
            .unwrap();

        h.clock.advance(Duration::hours(2));
        h.approve(&e1, "TX1", "C1", 300).await;
        h.approve(&e1, "TX2", "C2", 200).await;

        let entries = h.entries().await;
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[2].previous_hash(), Some(GENESIS_HASH));

        let audit = h.service.audit_chain().await.unwrap();
        assert!(audit.is_clean(), "{:?}", audit.entries);
        assert_eq!(audit.legacy, 2);
        assert_eq!(audit.active, 2);
        assert_eq!(
            audit.entries[0].key_fingerprint,
            Some(company_key().fingerprint().to_string())
        );

        let company = h.service.balance(&BalanceOwner::Company).await.unwrap();
        assert_eq!(company.total, Decimal::from(2000));
    }

    /// Test: A verified intent takes the ACTIVE path even before the cutoff
    #[tokio::test]
    async fn test_intent_before_cutoff_is_active() {
        let h = harness_with_cutoff();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        h.approve(&e1, "TX1", "C1", 300).await;

        let entry = h.entries().await.remove(0);
        assert!(matches!(entry.integrity, CryptoMode::Active { .. }));
    }

    /// Test: Legacy entries written without a company key are flagged on audit
    #[tokio::test]
    async fn test_unsigned_legacy_entry_flagged() {
        let h = Harness::new();
        let entry = h
            .service
            .record_transaction(deposit("DEP-1", 10), None)
            .await
            .unwrap();
        assert!(entry.integrity.is_unsigned());

        let report = h.service.verify_entry(entry.id).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.failures, vec![IntegrityFailure::UnsignedLegacy]);
    }

    /// Test: Legacy signatures only verify under the current company key
    #[tokio::test]
    async fn test_legacy_signature_under_other_company_key() {
        let h = Harness::with_config(config(), Some(company_key()));
        h.service
            .record_transaction(deposit("DEP-1", 10), None)
            .await
            .unwrap();
        let entries = h.entries().await;

        let other = Harness::with_config(
            config(),
            Some(LegacyCryptoBridge::from_keypair(Ed25519KeyPair::from_seed(
                [0xc1; 32],
            ))),
        );
        let audit = other
            .service
            .integrity_verifier()
            .audit_entries(&entries)
            .await
            .unwrap();

        assert_eq!(
            audit.entries[0].failures,
            vec![IntegrityFailure::LegacySignatureInvalid]
        );
    }

    /// Test: Legacy writes without a transaction id get a generated one
    #[tokio::test]
    async fn test_legacy_write_generates_transaction_id() {
        let h = Harness::with_config(config(), Some(company_key()));
        let request = ledger_integrity::TransactionRequest::new(
            ledger_integrity::TransactionType::Adjustment,
            Decimal::from(5),
        );

        let entry = h.service.record_transaction(request, None).await.unwrap();

        assert!(entry.transaction_id.starts_with("TX-"));
        assert!(h.service.verify_entry(entry.id).await.unwrap().valid);
    }
}
