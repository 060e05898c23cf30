//! Secret store access for the legacy company key.

use crate::domain::config::LegacyKeySource;
use crate::domain::errors::IntegrityError;
use zeroize::Zeroizing;

/// Read the PEM text a legacy key source points at.
pub fn read_legacy_pem(source: &LegacyKeySource) -> Result<Zeroizing<String>, IntegrityError> {
    match source {
        LegacyKeySource::InlinePem(pem) => Ok(pem.clone()),
        LegacyKeySource::File(path) => std::fs::read_to_string(path)
            .map(Zeroizing::new)
            .map_err(|e| IntegrityError::LegacyKey(format!("{}: {e}", path.display()))),
    }
}
