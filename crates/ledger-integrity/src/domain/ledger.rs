//! # Ledger Entries
//!
//! The financial transaction record, its integrity block, and the flat
//! persisted row it maps to.
//!
//! ## Invariants
//!
//! - Every entry carries exactly one `CryptoMode`
//! - Entries are append-only; only balances derived from them change

use crate::domain::canonical::content_hash;
use crate::domain::errors::IntegrityError;
use crate::domain::intent::ActorRole;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Signature version marker for legacy (company key) entries.
pub const SIGNATURE_VERSION_LEGACY: u8 = 1;
/// Signature version marker for per-actor (chained) entries.
pub const SIGNATURE_VERSION_ACTIVE: u8 = 2;

/// Business type of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    ContractPayment,
    ContractRefund,
    Payroll,
    Deposit,
    Withdrawal,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::ContractPayment => "CONTRACT_PAYMENT",
            TransactionType::ContractRefund => "CONTRACT_REFUND",
            TransactionType::Payroll => "PAYROLL",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Adjustment => "ADJUSTMENT",
        }
    }
}

/// Persisted crypto status flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CryptoStatus {
    Active,
    Legacy,
}

/// Integrity block of a ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CryptoMode {
    /// Pre-migration: one company-wide key.
    Legacy {
        payload_hash: String,
        /// `None` when no legacy signing key was available; the entry is
        /// then stored unsigned and flagged.
        company_signature: Option<String>,
        algorithm: String,
    },
    /// Per-actor signed intent, chained by keyed checksum.
    Active {
        payload_hash: String,
        previous_hash: String,
        ledger_hmac: String,
        actor_id: String,
        actor_role: ActorRole,
        actor_key_id: String,
        actor_signature: String,
        nonce: String,
        intent_timestamp: DateTime<Utc>,
    },
}

impl CryptoMode {
    pub fn status(&self) -> CryptoStatus {
        match self {
            CryptoMode::Legacy { .. } => CryptoStatus::Legacy,
            CryptoMode::Active { .. } => CryptoStatus::Active,
        }
    }

    pub fn signature_version(&self) -> u8 {
        match self {
            CryptoMode::Legacy { .. } => SIGNATURE_VERSION_LEGACY,
            CryptoMode::Active { .. } => SIGNATURE_VERSION_ACTIVE,
        }
    }

    pub fn payload_hash(&self) -> &str {
        match self {
            CryptoMode::Legacy { payload_hash, .. } | CryptoMode::Active { payload_hash, .. } => {
                payload_hash
            }
        }
    }

    /// Legacy entry written without a company signature.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            CryptoMode::Legacy {
                company_signature: None,
                ..
            }
        )
    }
}

/// One immutable ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_id: String,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub currency: Option<String>,
    /// Signed delta applied to the employee aggregate.
    pub employee_delta: Decimal,
    /// Signed delta applied to the company aggregate.
    pub company_delta: Decimal,
    pub employee_id: Option<String>,
    pub contract_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub integrity: CryptoMode,
}

impl LedgerEntry {
    pub fn crypto_status(&self) -> CryptoStatus {
        self.integrity.status()
    }

    /// Link value this entry contributes to the chain (ACTIVE only).
    pub fn ledger_hmac(&self) -> Option<&str> {
        match &self.integrity {
            CryptoMode::Active { ledger_hmac, .. } => Some(ledger_hmac),
            CryptoMode::Legacy { .. } => None,
        }
    }

    pub fn previous_hash(&self) -> Option<&str> {
        match &self.integrity {
            CryptoMode::Active { previous_hash, .. } => Some(previous_hash),
            CryptoMode::Legacy { .. } => None,
        }
    }
}

/// Canonical payload hashed for legacy-mode entries.
///
/// Absent optional references are omitted, not written as `null`.
pub fn legacy_payload(
    transaction_id: &str,
    tx_type: TransactionType,
    amount: Decimal,
    employee_delta: Decimal,
    company_delta: Decimal,
    employee_id: Option<&str>,
    contract_id: Option<&str>,
    created_at: DateTime<Utc>,
) -> Value {
    let mut map = Map::new();
    map.insert("transactionId".into(), Value::from(transaction_id));
    map.insert("type".into(), Value::from(tx_type.as_str()));
    map.insert("amount".into(), Value::from(amount.normalize().to_string()));
    map.insert(
        "employeeDelta".into(),
        Value::from(employee_delta.normalize().to_string()),
    );
    map.insert(
        "companyDelta".into(),
        Value::from(company_delta.normalize().to_string()),
    );
    if let Some(employee_id) = employee_id {
        map.insert("employeeId".into(), Value::from(employee_id));
    }
    if let Some(contract_id) = contract_id {
        map.insert("contractId".into(), Value::from(contract_id));
    }
    map.insert(
        "createdAt".into(),
        Value::from(created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Value::Object(map)
}

/// Content hash of an entry's legacy payload.
pub fn legacy_content_hash(entry: &LedgerEntry) -> String {
    content_hash(&legacy_payload(
        &entry.transaction_id,
        entry.tx_type,
        entry.amount,
        entry.employee_delta,
        entry.company_delta,
        entry.employee_id.as_deref(),
        entry.contract_id.as_deref(),
        entry.created_at,
    ))
}

// =============================================================================
// TRANSACTION REQUEST
// =============================================================================

/// Caller input to the transaction factory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Required for legacy writes; ignored when a verified intent supplies one.
    pub transaction_id: Option<String>,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub employee_delta: Decimal,
    pub company_delta: Decimal,
    pub employee_id: Option<String>,
    pub contract_id: Option<String>,
    pub description: String,
}

impl TransactionRequest {
    pub fn new(tx_type: TransactionType, amount: Decimal) -> Self {
        Self {
            transaction_id: None,
            tx_type,
            amount,
            currency: None,
            employee_delta: Decimal::ZERO,
            company_delta: Decimal::ZERO,
            employee_id: None,
            contract_id: None,
            description: String::new(),
        }
    }

    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn with_company_delta(mut self, delta: Decimal) -> Self {
        self.company_delta = delta;
        self
    }

    pub fn with_employee(mut self, employee_id: impl Into<String>, delta: Decimal) -> Self {
        self.employee_id = Some(employee_id.into());
        self.employee_delta = delta;
        self
    }

    pub fn with_contract(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = Some(contract_id.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Reject requests that could not be applied consistently.
    pub fn validate(&self) -> Result<(), IntegrityError> {
        if self.amount.is_sign_negative() {
            return Err(IntegrityError::MalformedTransaction(
                "amount must not be negative".into(),
            ));
        }
        if !self.employee_delta.is_zero() && self.employee_id.is_none() {
            return Err(IntegrityError::MalformedTransaction(
                "employee delta without employee reference".into(),
            ));
        }
        if let Some(id) = &self.transaction_id {
            if id.trim().is_empty() {
                return Err(IntegrityError::MalformedTransaction(
                    "transaction id is empty".into(),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// BALANCES
// =============================================================================

/// Which running total an aggregate tracks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceOwner {
    Company,
    Employee(String),
}

/// Running total with a back-reference to the last entry that moved it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAggregate {
    pub owner: BalanceOwner,
    pub total: Decimal,
    pub last_entry_id: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BalanceAggregate {
    pub fn empty(owner: BalanceOwner) -> Self {
        Self {
            owner,
            total: Decimal::ZERO,
            last_entry_id: None,
            updated_at: None,
        }
    }

    pub fn apply(&mut self, delta: Decimal, entry: &LedgerEntry) {
        self.total += delta;
        self.last_entry_id = Some(entry.id);
        self.updated_at = Some(entry.created_at);
    }
}

// =============================================================================
// PERSISTED ROW
// =============================================================================

/// Flat persisted row, as stored by the application database.
///
/// Integrity fields follow the persisted schema: `cryptoStatus`,
/// `payloadHash`, `signature`, `previousTransactionHash`, `ledgerHmac`,
/// `legacyAlgorithm`, `signatureVersion`, `actorId`, `actorKeyId`,
/// `actorSignature`, `nonce`, `intentTimestamp`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub employee_delta: Decimal,
    #[serde(default)]
    pub company_delta: Decimal,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub crypto_status: Option<CryptoStatus>,
    #[serde(default)]
    pub payload_hash: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub previous_transaction_hash: Option<String>,
    #[serde(default)]
    pub ledger_hmac: Option<String>,
    #[serde(default)]
    pub legacy_algorithm: Option<String>,
    #[serde(default)]
    pub signature_version: Option<u8>,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub actor_role: Option<ActorRole>,
    #[serde(default)]
    pub actor_key_id: Option<String>,
    #[serde(default)]
    pub actor_signature: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub intent_timestamp: Option<DateTime<Utc>>,
}

impl LedgerRecord {
    /// Crypto path of a stored row: the explicit flag wins; otherwise a row
    /// without a version-2 marker is legacy.
    pub fn classify(&self) -> CryptoStatus {
        match (self.crypto_status, self.signature_version) {
            (Some(status), _) => status,
            (None, Some(SIGNATURE_VERSION_ACTIVE)) => CryptoStatus::Active,
            _ => CryptoStatus::Legacy,
        }
    }

    /// Rebuild the typed entry. Fails when the row lacks a field its crypto
    /// path requires.
    pub fn into_entry(self) -> Result<LedgerEntry, IntegrityError> {
        let integrity = match self.classify() {
            CryptoStatus::Legacy => CryptoMode::Legacy {
                payload_hash: self
                    .payload_hash
                    .ok_or(IntegrityError::MissingField("payloadHash"))?,
                company_signature: self.signature.filter(|s| !s.is_empty()),
                algorithm: self
                    .legacy_algorithm
                    .unwrap_or_else(|| crate::domain::config::LEGACY_ALGORITHM.to_string()),
            },
            CryptoStatus::Active => CryptoMode::Active {
                payload_hash: self
                    .payload_hash
                    .ok_or(IntegrityError::MissingField("payloadHash"))?,
                previous_hash: self
                    .previous_transaction_hash
                    .ok_or(IntegrityError::MissingField("previousTransactionHash"))?,
                ledger_hmac: self
                    .ledger_hmac
                    .ok_or(IntegrityError::MissingField("ledgerHmac"))?,
                actor_id: self.actor_id.ok_or(IntegrityError::MissingField("actorId"))?,
                actor_role: self
                    .actor_role
                    .ok_or(IntegrityError::MissingField("actorRole"))?,
                actor_key_id: self
                    .actor_key_id
                    .ok_or(IntegrityError::MissingField("actorKeyId"))?,
                actor_signature: self
                    .actor_signature
                    .or(self.signature)
                    .ok_or(IntegrityError::MissingField("actorSignature"))?,
                nonce: self.nonce.ok_or(IntegrityError::MissingField("nonce"))?,
                intent_timestamp: self
                    .intent_timestamp
                    .ok_or(IntegrityError::MissingField("intentTimestamp"))?,
            },
        };

        Ok(LedgerEntry {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            transaction_id: self.transaction_id,
            tx_type: self.tx_type,
            amount: self.amount,
            currency: self.currency,
            employee_delta: self.employee_delta,
            company_delta: self.company_delta,
            employee_id: self.employee_id,
            contract_id: self.contract_id,
            description: self.description,
            created_at: self.created_at,
            integrity,
        })
    }
}

impl From<&LedgerEntry> for LedgerRecord {
    fn from(entry: &LedgerEntry) -> Self {
        let mut record = LedgerRecord {
            id: Some(entry.id),
            transaction_id: entry.transaction_id.clone(),
            tx_type: entry.tx_type,
            amount: entry.amount,
            currency: entry.currency.clone(),
            employee_delta: entry.employee_delta,
            company_delta: entry.company_delta,
            employee_id: entry.employee_id.clone(),
            contract_id: entry.contract_id.clone(),
            description: entry.description.clone(),
            created_at: entry.created_at,
            crypto_status: Some(entry.integrity.status()),
            payload_hash: Some(entry.integrity.payload_hash().to_string()),
            signature: None,
            previous_transaction_hash: None,
            ledger_hmac: None,
            legacy_algorithm: None,
            signature_version: Some(entry.integrity.signature_version()),
            actor_id: None,
            actor_role: None,
            actor_key_id: None,
            actor_signature: None,
            nonce: None,
            intent_timestamp: None,
        };

        match &entry.integrity {
            CryptoMode::Legacy {
                company_signature,
                algorithm,
                ..
            } => {
                record.signature = company_signature.clone();
                record.legacy_algorithm = Some(algorithm.clone());
            }
            CryptoMode::Active {
                previous_hash,
                ledger_hmac,
                actor_id,
                actor_role,
                actor_key_id,
                actor_signature,
                nonce,
                intent_timestamp,
                ..
            } => {
                record.signature = Some(actor_signature.clone());
                record.previous_transaction_hash = Some(previous_hash.clone());
                record.ledger_hmac = Some(ledger_hmac.clone());
                record.actor_id = Some(actor_id.clone());
                record.actor_role = Some(*actor_role);
                record.actor_key_id = Some(actor_key_id.clone());
                record.actor_signature = Some(actor_signature.clone());
                record.nonce = Some(nonce.clone());
                record.intent_timestamp = Some(*intent_timestamp);
            }
        }

        record
    }
}
