//! # Ledger Audit
//!
//! Re-verifies an exported ledger snapshot and prints the audit report as
//! JSON. Exits non-zero when any entry fails verification.
//!
//! ```text
//! ledger-audit [SNAPSHOT.json]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ledger_integrity::adapters::SystemTimeSource;
use ledger_integrity::IntegrityConfig;
use ledger_runtime::{audit_snapshot, LedgerSnapshot, ENV_SNAPSHOT_PATH};

fn snapshot_path() -> Result<PathBuf> {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(ENV_SNAPSHOT_PATH))
        .map(PathBuf::from)
        .with_context(|| {
            format!("usage: ledger-audit <snapshot.json> (or set {ENV_SNAPSHOT_PATH})")
        })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging; reports go to stdout, logs to stderr
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = IntegrityConfig::from_env().context("loading integrity configuration")?;
    config
        .validate_for_production()
        .context("integrity configuration is not usable")?;

    let path = snapshot_path()?;
    let snapshot = LedgerSnapshot::from_file(&path)?;
    info!(
        path = %path.display(),
        keys = snapshot.keys.len(),
        records = snapshot.records.len(),
        "Loaded ledger snapshot"
    );

    let outcome = audit_snapshot(config, snapshot, Arc::new(SystemTimeSource)).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.is_clean() {
        info!(total = outcome.audit.total, "Ledger verified");
        Ok(ExitCode::SUCCESS)
    } else {
        for report in outcome.audit.invalid_entries() {
            warn!(
                tx_id = %report.transaction_id,
                failures = ?report.failures,
                "Entry failed verification"
            );
        }
        warn!(
            invalid = outcome.audit.invalid,
            rejected_rows = outcome.rejected_rows.len(),
            rejected_keys = outcome.rejected_keys.len(),
            "Ledger failed verification"
        );
        Ok(ExitCode::FAILURE)
    }
}
