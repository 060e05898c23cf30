//! # Integration Tests
//!
//! End-to-end flows through `LedgerIntegrityApi`, over the in-memory store.

pub mod flows;
pub mod migration;
pub mod tamper;
