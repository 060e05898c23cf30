//! # Integrity Configuration
//!
//! Secrets and migration settings, loaded once at startup and passed in.
//!
//! ## Security Requirements
//!
//! - The current checksum key MUST NOT be empty or all-zero in production
//! - Secrets are zeroized on drop and never printed by `Debug`

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Maximum allowed distance between an intent timestamp and server time.
pub const FRESHNESS_WINDOW_SECS: i64 = 300;

/// Nonce rows outlive the freshness window so a replay inside the window is
/// always caught by the nonce table.
pub const NONCE_TTL_SECS: i64 = 2 * FRESHNESS_WINDOW_SECS;

/// Algorithm tag stored on legacy-mode entries.
pub const LEGACY_ALGORITHM: &str = "Ed25519-legacy";

/// Minimum checksum key length accepted in production.
pub const MIN_CHECKSUM_KEY_LEN: usize = 32;

pub const ENV_MIGRATION_CUTOFF: &str = "LEDGER_MIGRATION_CUTOFF";
pub const ENV_LEGACY_PRIVATE_KEY_PEM: &str = "LEDGER_LEGACY_PRIVATE_KEY_PEM";
pub const ENV_LEGACY_KEY_PATH: &str = "LEDGER_LEGACY_KEY_PATH";
pub const ENV_HMAC_SECRET: &str = "LEDGER_HMAC_SECRET";
pub const ENV_HMAC_PREVIOUS_SECRET: &str = "LEDGER_HMAC_PREVIOUS_SECRET";

/// Where the company-wide legacy key pair lives.
#[derive(Clone)]
pub enum LegacyKeySource {
    /// PEM text supplied directly (PKCS#8 private or SPKI public).
    InlinePem(Zeroizing<String>),
    /// Path to a PEM file in the secret store.
    File(PathBuf),
}

impl fmt::Debug for LegacyKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyKeySource::InlinePem(_) => f.write_str("InlinePem(<redacted>)"),
            LegacyKeySource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Keyed-checksum secrets: the current key plus the one it replaced.
#[derive(Clone, Default)]
pub struct ChecksumKeys {
    pub current: Zeroizing<Vec<u8>>,
    /// Accepted for verification only, during key rotation.
    pub previous: Option<Zeroizing<Vec<u8>>>,
}

impl ChecksumKeys {
    pub fn new(current: impl Into<Vec<u8>>) -> Self {
        Self {
            current: Zeroizing::new(current.into()),
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: impl Into<Vec<u8>>) -> Self {
        self.previous = Some(Zeroizing::new(previous.into()));
        self
    }

    /// Current key first, then the previous one.
    pub fn verification_keys(&self) -> impl Iterator<Item = &[u8]> {
        std::iter::once(self.current.as_slice())
            .chain(self.previous.iter().map(|k| k.as_slice()))
            .filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for ChecksumKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumKeys")
            .field("current_len", &self.current.len())
            .field("has_previous", &self.previous.is_some())
            .finish()
    }
}

/// Complete integrity-core configuration.
#[derive(Clone, Debug)]
pub struct IntegrityConfig {
    /// From this instant on, every ledger write needs a verified intent.
    /// `None` means the cutoff is not configured and intents stay optional.
    pub migration_cutoff: Option<DateTime<Utc>>,
    pub legacy_key: Option<LegacyKeySource>,
    pub checksum_keys: ChecksumKeys,
    pub freshness_window_secs: i64,
    pub nonce_ttl_secs: i64,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            migration_cutoff: None,
            legacy_key: None,
            checksum_keys: ChecksumKeys::default(),
            freshness_window_secs: FRESHNESS_WINDOW_SECS,
            nonce_ttl_secs: NONCE_TTL_SECS,
        }
    }
}

impl IntegrityConfig {
    /// Load from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = IntegrityConfig::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_MIGRATION_CUTOFF) {
            let cutoff = DateTime::parse_from_rfc3339(raw.trim())
                .map_err(|_| ConfigError::InvalidCutoff(raw.clone()))?;
            config.migration_cutoff = Some(cutoff.with_timezone(&Utc));
            info!(cutoff = %raw.trim(), "Loaded migration cutoff");
        } else {
            warn!("{} not set; signed intents are optional", ENV_MIGRATION_CUTOFF);
        }

        config.legacy_key = match (get(ENV_LEGACY_PRIVATE_KEY_PEM), get(ENV_LEGACY_KEY_PATH)) {
            (Some(pem), _) => Some(LegacyKeySource::InlinePem(Zeroizing::new(pem))),
            (None, Some(path)) => Some(LegacyKeySource::File(PathBuf::from(path))),
            (None, None) => None,
        };
        if config.legacy_key.is_none() {
            warn!("No legacy key configured; pre-cutoff entries will be stored unsigned");
        }

        match get(ENV_HMAC_SECRET) {
            Some(secret) => {
                config.checksum_keys.current = Zeroizing::new(decode_secret(&secret));
                info!("Loaded ledger checksum secret from environment");
            }
            None => warn!("{} not set; ACTIVE ledger writes will fail", ENV_HMAC_SECRET),
        }
        config.checksum_keys.previous =
            get(ENV_HMAC_PREVIOUS_SECRET).map(|s| Zeroizing::new(decode_secret(&s)));

        Ok(config)
    }

    /// Validate configuration for production readiness.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - the current checksum key is empty or all zeros
    /// - the current checksum key is shorter than `MIN_CHECKSUM_KEY_LEN`
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        let current = &self.checksum_keys.current;
        if current.is_empty() || current.iter().all(|b| *b == 0) {
            return Err(ConfigError::InsecureChecksumKey);
        }
        if current.len() < MIN_CHECKSUM_KEY_LEN {
            return Err(ConfigError::ChecksumKeyTooShort {
                min: MIN_CHECKSUM_KEY_LEN,
                actual: current.len(),
            });
        }
        Ok(())
    }

    /// Whether a write at `now` must carry a verified intent.
    pub fn intent_required_at(&self, now: DateTime<Utc>) -> bool {
        self.migration_cutoff.is_some_and(|cutoff| now >= cutoff)
    }
}

/// Hex when the value decodes as hex, raw UTF-8 bytes otherwise.
fn decode_secret(raw: &str) -> Vec<u8> {
    let trimmed = raw.trim();
    hex::decode(trimmed).unwrap_or_else(|_| trimmed.as_bytes().to_vec())
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Migration cutoff is not RFC 3339.
    #[error("Invalid LEDGER_MIGRATION_CUTOFF value: {0}")]
    InvalidCutoff(String),

    /// Checksum key is not set (empty or zero value).
    #[error(
        "SECURITY VIOLATION: ledger checksum key is empty or zero. \
         Set LEDGER_HMAC_SECRET environment variable."
    )]
    InsecureChecksumKey,

    /// Checksum key is set but too short.
    #[error("Ledger checksum key must be at least {min} bytes (got {actual})")]
    ChecksumKeyTooShort { min: usize, actual: usize },
}
