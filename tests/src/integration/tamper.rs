//! # Tamper Evidence
//!
//! Stored rows are edited after the fact (as a database operator could) and
//! re-audited from a restored copy of the ledger.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use ledger_integrity::{
        ActorKey, AuditReport, ChecksumKeys, CryptoMode, IntegrityConfig, IntegrityFailure,
        LedgerEntry, LedgerIntegrityApi, LedgerRecord,
    };

    /// Ledger of `n` ACTIVE approvals by one actor, plus that actor's keys.
    async fn signed_ledger(n: usize) -> (Harness, Vec<LedgerEntry>, Vec<ActorKey>) {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;
        for i in 0..n {
            h.approve(&e1, &format!("TX{i}"), &format!("C{i}"), 100).await;
        }
        let entries = h.entries().await;
        let keys = h.service.list_keys("E1").await.unwrap();
        (h, entries, keys)
    }

    fn validity(audit: &AuditReport) -> Vec<bool> {
        audit.entries.iter().map(|r| r.valid).collect()
    }

    fn set_payload_hash(entry: &mut LedgerEntry, forged: &str) {
        if let CryptoMode::Active { payload_hash, .. } = &mut entry.integrity {
            *payload_hash = forged.to_string();
        }
    }

    /// Test: Editing entry k invalidates k and every later entry
    #[tokio::test]
    async fn test_tamper_cascades_forward() {
        let (h, mut entries, _) = signed_ledger(5).await;
        set_payload_hash(&mut entries[2], &"f".repeat(64));

        let audit = h
            .service
            .integrity_verifier()
            .audit_entries(&entries)
            .await
            .unwrap();

        assert_eq!(validity(&audit), vec![true, true, false, false, false]);
        let tampered = &audit.entries[2].failures;
        assert!(tampered.contains(&IntegrityFailure::ChainLinkMismatch));
        assert!(tampered.contains(&IntegrityFailure::ActorSignatureInvalid));
        // later entries are untouched but no longer link to the recomputed chain
        assert!(audit.entries[3]
            .failures
            .contains(&IntegrityFailure::PreviousHashMismatch));
    }

    /// Test: Deleting an entry breaks the link of its successor
    #[tokio::test]
    async fn test_deleted_entry_detected() {
        let (h, mut entries, _) = signed_ledger(4).await;
        entries.remove(1);

        let audit = h
            .service
            .integrity_verifier()
            .audit_entries(&entries)
            .await
            .unwrap();

        assert_eq!(validity(&audit), vec![true, false, false]);
    }

    /// Test: Reordering entries is detected
    #[tokio::test]
    async fn test_reordered_entries_detected() {
        let (h, mut entries, _) = signed_ledger(3).await;
        entries.swap(0, 1);

        let audit = h
            .service
            .integrity_verifier()
            .audit_entries(&entries)
            .await
            .unwrap();

        assert!(!audit.entries[0].valid);
        assert!(!audit.is_clean());
    }

    /// Test: A forged link fails even when recomputed by someone without the key
    #[tokio::test]
    async fn test_forged_link_without_checksum_key() {
        let (h, mut entries, _) = signed_ledger(2).await;
        if let CryptoMode::Active { ledger_hmac, .. } = &mut entries[1].integrity {
            *ledger_hmac = shared_crypto::sha256_hex(b"guessing the link");
        }

        let report = h
            .service
            .integrity_verifier()
            .verify_entry(&entries[1])
            .await
            .unwrap();

        assert_eq!(report.failures, vec![IntegrityFailure::ChainLinkMismatch]);
    }

    /// Test: Exported rows restore into a fresh store and audit identically
    #[tokio::test]
    async fn test_restored_rows_audit_clean() {
        let (_, entries, keys) = signed_ledger(3).await;

        let restored = Harness::new();
        for key in keys {
            restored.store.restore_key(key).unwrap();
        }
        for entry in &entries {
            let row = LedgerRecord::from(entry);
            restored
                .store
                .restore_entry(row.into_entry().unwrap())
                .unwrap();
        }

        let audit = restored.service.audit_chain().await.unwrap();
        assert_eq!(audit.total, 3);
        assert!(audit.is_clean());
    }

    /// Test: Links made under the previous checksum key verify during rotation
    #[tokio::test]
    async fn test_checksum_key_rotation_grace() {
        let (_, entries, keys) = signed_ledger(2).await;

        let rotated = IntegrityConfig {
            checksum_keys: ChecksumKeys::new(vec![0x77; 32]).with_previous(CHECKSUM_KEY.to_vec()),
            ..config()
        };
        let h = Harness::with_config(rotated, None);
        for key in keys.iter().cloned() {
            h.store.restore_key(key).unwrap();
        }

        let audit = h
            .service
            .integrity_verifier()
            .audit_entries(&entries)
            .await
            .unwrap();
        assert!(audit.is_clean());
        assert!(audit.entries.iter().all(|r| r.previous_checksum_key));

        // once the previous key is dropped, the old links no longer verify
        let forgotten = IntegrityConfig {
            checksum_keys: ChecksumKeys::new(vec![0x77; 32]),
            ..config()
        };
        let h = Harness::with_config(forgotten, None);
        for key in keys {
            h.store.restore_key(key).unwrap();
        }
        let audit = h
            .service
            .integrity_verifier()
            .audit_entries(&entries)
            .await
            .unwrap();
        assert!(audit
            .entries
            .iter()
            .all(|r| r.failures.contains(&IntegrityFailure::ChainLinkMismatch)));
    }
}
