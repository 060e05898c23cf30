//! # Ledger Runtime
//!
//! Offline audit runner for the ledger integrity core.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Validate the checksum key is present and long enough
//! 3. Restore the snapshot (keys, then ledger rows in commit order)
//! 4. Audit the chain and print the report

pub mod snapshot;

pub use snapshot::{audit_snapshot, AuditOutcome, LedgerSnapshot, RejectedKey};

/// Environment variable naming the snapshot file when no argument is given.
pub const ENV_SNAPSHOT_PATH: &str = "LEDGER_SNAPSHOT_PATH";
