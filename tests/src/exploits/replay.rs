//! # Replay Attacks
//!
//! Captured envelopes and verified intents resubmitted in every shape that
//! might slip past a single uniqueness check.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use chrono::Duration;
    use ledger_integrity::{BalanceOwner, IntegrityError, LedgerIntegrityApi};
    use rust_decimal::Decimal;

    /// Test: Same transaction id under a fresh nonce is a duplicate
    #[tokio::test]
    async fn test_fresh_nonce_same_transaction() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;
        h.approve(&e1, "TX1", "C1", 5000).await;

        let resigned = e1.sign(approval(&e1, "TX1", "C1", 5000, &fresh_nonce(), h.now()));
        let err = h
            .service
            .verify_intent(&resigned, &e1.caller(), &approval_binding("C1", 5000))
            .await
            .unwrap_err();

        assert_eq!(err, IntegrityError::DuplicateTransaction("TX1".into()));
    }

    /// Test: Same nonce on a different transaction is a replay
    #[tokio::test]
    async fn test_reused_nonce_new_transaction() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        let first = e1.sign(approval(&e1, "TX1", "C1", 10, "n-shared", h.now()));
        let intent = h
            .service
            .verify_intent(&first, &e1.caller(), &approval_binding("C1", 10))
            .await
            .unwrap();
        h.service
            .record_transaction(contract_payment("TX1", "C1", 10), Some(intent))
            .await
            .unwrap();

        let second = e1.sign(approval(&e1, "TX2", "C2", 10, "n-shared", h.now()));
        let err = h
            .service
            .verify_intent(&second, &e1.caller(), &approval_binding("C2", 10))
            .await
            .unwrap_err();

        assert_eq!(err, IntegrityError::ReplayDetected);
    }

    /// Test: One verified intent raced through many writers lands once
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replay_commits_once() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        let envelope = e1.sign(approval(&e1, "TX1", "C1", 5000, "n1", h.now()));
        let intent = h
            .service
            .verify_intent(&envelope, &e1.caller(), &approval_binding("C1", 5000))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = h.service.clone();
            let intent = intent.clone();
            handles.push(tokio::spawn(async move {
                service
                    .record_transaction(contract_payment("TX1", "C1", 5000), Some(intent))
                    .await
            }));
        }

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(IntegrityError::ReplayDetected | IntegrityError::DuplicateTransaction(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(committed, 1);
        let company = h.service.balance(&BalanceOwner::Company).await.unwrap();
        assert_eq!(company.total, Decimal::from(5000));
        assert!(h.service.audit_chain().await.unwrap().is_clean());
    }

    /// Test: A captured envelope replayed after the freshness window is stale
    #[tokio::test]
    async fn test_delayed_replay_is_stale() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        let captured = e1.sign(approval(&e1, "TX1", "C1", 5000, "n1", h.now()));
        h.clock.advance(Duration::minutes(6));

        let err = h
            .service
            .verify_intent(&captured, &e1.caller(), &approval_binding("C1", 5000))
            .await
            .unwrap_err();

        assert!(matches!(err, IntegrityError::StaleTimestamp { .. }));
    }

    /// Test: Future-dated intents are refused as well
    #[tokio::test]
    async fn test_future_dated_intent() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        let future = h.now() + Duration::minutes(10);
        let envelope = e1.sign(approval(&e1, "TX1", "C1", 5000, "n1", future));

        let err = h
            .service
            .verify_intent(&envelope, &e1.caller(), &approval_binding("C1", 5000))
            .await
            .unwrap_err();

        assert!(matches!(err, IntegrityError::StaleTimestamp { .. }));
    }

    /// Test: Consumed intents cannot be turned into a ledger write afterwards
    #[tokio::test]
    async fn test_consumed_intent_cannot_be_recorded() {
        let h = Harness::new();
        let e1 = Actor::new("E1", "CLIENT", "k1", 1);
        h.register(&e1).await;

        let envelope = e1.sign(approval(&e1, "TX1", "C1", 5000, "n1", h.now()));
        let intent = h
            .service
            .verify_intent(&envelope, &e1.caller(), &approval_binding("C1", 5000))
            .await
            .unwrap();
        h.service.consume_intent(&intent).await.unwrap();

        let err = h
            .service
            .record_transaction(contract_payment("TX1", "C1", 5000), Some(intent))
            .await
            .unwrap_err();

        assert_eq!(err, IntegrityError::ReplayDetected);
        assert!(h.entries().await.is_empty());
    }
}
