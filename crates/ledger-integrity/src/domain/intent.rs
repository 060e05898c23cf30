//! # Signed Intents
//!
//! Roles, actions and the client-signed payload, plus the records a verified
//! intent leaves behind (nonce row, action-intent receipt).
//!
//! Role and action strings are normalized here, at the input boundary, and
//! nowhere else.

use crate::domain::errors::IntegrityError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ROLES
// =============================================================================

/// Role an actor signs under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    Hr,
    Finance,
    Manager,
    Employee,
    Client,
}

impl ActorRole {
    /// Wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Admin => "ADMIN",
            ActorRole::Hr => "HR",
            ActorRole::Finance => "FINANCE",
            ActorRole::Manager => "MANAGER",
            ActorRole::Employee => "EMPLOYEE",
            ActorRole::Client => "CLIENT",
        }
    }

    /// Roles that may act on behalf of any claimed role.
    pub fn is_admin_override(&self) -> bool {
        matches!(self, ActorRole::Admin)
    }

    /// Normalize a raw role string: trim, uppercase, `-`/space → `_`,
    /// strip a leading `ROLE_`.
    pub fn normalize(raw: &str) -> Result<Self, IntegrityError> {
        let upper = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let bare = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        match bare {
            "ADMIN" | "ADMINISTRATOR" | "SUPER_ADMIN" => Ok(ActorRole::Admin),
            "HR" | "HUMAN_RESOURCES" => Ok(ActorRole::Hr),
            "FINANCE" => Ok(ActorRole::Finance),
            "MANAGER" => Ok(ActorRole::Manager),
            "EMPLOYEE" => Ok(ActorRole::Employee),
            "CLIENT" => Ok(ActorRole::Client),
            _ => Err(IntegrityError::RoleNotPermitted(raw.trim().to_string())),
        }
    }
}

impl FromStr for ActorRole {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller's normalized role set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<ActorRole>);

impl RoleSet {
    /// Build from raw role strings as asserted by the authentication layer.
    ///
    /// Unknown roles are dropped; they can never match a claimed role.
    pub fn from_raw<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for raw in roles {
            match ActorRole::normalize(raw.as_ref()) {
                Ok(role) => {
                    set.insert(role);
                }
                Err(_) => tracing::debug!(role = raw.as_ref(), "Ignoring unknown caller role"),
            }
        }
        Self(set)
    }

    /// Whether the caller may sign under `claimed`.
    pub fn permits(&self, claimed: ActorRole) -> bool {
        self.0.contains(&claimed) || self.0.iter().any(ActorRole::is_admin_override)
    }

    pub fn contains(&self, role: ActorRole) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ActorRole> for RoleSet {
    fn from_iter<T: IntoIterator<Item = ActorRole>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Server-side action names a signed intent can authorize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentAction {
    ContractApprove,
    ContractReject,
    ContractComplete,
    ContractCancel,
    PayrollDisburse,
    FundsDeposit,
    FundsWithdraw,
}

impl IntentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentAction::ContractApprove => "CONTRACT_APPROVE",
            IntentAction::ContractReject => "CONTRACT_REJECT",
            IntentAction::ContractComplete => "CONTRACT_COMPLETE",
            IntentAction::ContractCancel => "CONTRACT_CANCEL",
            IntentAction::PayrollDisburse => "PAYROLL_DISBURSE",
            IntentAction::FundsDeposit => "FUNDS_DEPOSIT",
            IntentAction::FundsWithdraw => "FUNDS_WITHDRAW",
        }
    }

    /// Contract-bound actions must name the contract they act on.
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            IntentAction::ContractApprove
                | IntentAction::ContractReject
                | IntentAction::ContractComplete
                | IntentAction::ContractCancel
        )
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "CONTRACT_APPROVE" => Some(IntentAction::ContractApprove),
            "CONTRACT_REJECT" => Some(IntentAction::ContractReject),
            "CONTRACT_COMPLETE" => Some(IntentAction::ContractComplete),
            "CONTRACT_CANCEL" => Some(IntentAction::ContractCancel),
            "PAYROLL_DISBURSE" => Some(IntentAction::PayrollDisburse),
            "FUNDS_DEPOSIT" => Some(IntentAction::FundsDeposit),
            "FUNDS_WITHDRAW" => Some(IntentAction::FundsWithdraw),
            _ => None,
        }
    }
}

impl fmt::Display for IntentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SIGNED PAYLOAD / ENVELOPE
// =============================================================================

/// Wire envelope: `{ payload, signature, actorKeyId }`.
///
/// The payload stays a raw JSON value: the content hash is computed over
/// exactly what the client signed, not over a re-serialized struct.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedEnvelope {
    pub payload: Value,
    /// Base64 Ed25519 signature over the content hash.
    pub signature: String,
    pub actor_key_id: String,
}

/// Structurally validated view of a signed payload.
///
/// Role and action stay raw here; they are checked during binding, which is
/// where a mismatch is reported as forbidden rather than malformed.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedPayload {
    pub tx_id: String,
    pub actor_id: String,
    pub actor_role: String,
    pub action: String,
    pub contract_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub nonce: String,
    /// Raw ISO-8601 timestamp; parsed during the freshness check.
    pub timestamp: String,
}

impl SignedPayload {
    /// Structural validation: required fields present and typed, `txId` and
    /// `nonce` non-empty.
    pub fn parse(raw: &Value) -> Result<Self, IntegrityError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| IntegrityError::MalformedPayload("payload must be an object".into()))?;

        let tx_id = required_str(obj, "txId")?;
        let nonce = required_str(obj, "nonce")?;
        if tx_id.trim().is_empty() {
            return Err(IntegrityError::MissingField("txId"));
        }
        if nonce.trim().is_empty() {
            return Err(IntegrityError::MissingField("nonce"));
        }

        Ok(Self {
            tx_id,
            actor_id: required_str(obj, "actorId")?,
            actor_role: required_str(obj, "actorRole")?,
            action: required_str(obj, "action")?,
            contract_id: optional_str(obj, "contractId")?,
            amount: optional_amount(obj, "amount")?,
            currency: optional_str(obj, "currency")?,
            nonce,
            timestamp: required_str(obj, "timestamp")?,
        })
    }

    /// Parse the payload timestamp as ISO-8601 / RFC 3339.
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>, IntegrityError> {
        DateTime::parse_from_rfc3339(self.timestamp.trim())
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| IntegrityError::InvalidTimestamp(self.timestamp.clone()))
    }
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, IntegrityError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(IntegrityError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(IntegrityError::MalformedPayload(format!(
            "{field} must be a string"
        ))),
    }
}

fn optional_str(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, IntegrityError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(IntegrityError::MalformedPayload(format!(
            "{field} must be a string"
        ))),
    }
}

fn optional_amount(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Decimal>, IntegrityError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => parse_decimal(&n.to_string())
            .map(Some)
            .ok_or_else(|| IntegrityError::MalformedPayload(format!("{field} is not a decimal"))),
        Some(_) => Err(IntegrityError::MalformedPayload(format!(
            "{field} must be a number"
        ))),
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
        .map(|d| d.normalize())
}

// =============================================================================
// VERIFICATION INPUTS
// =============================================================================

/// Identity asserted by the authentication layer for the current request.
#[derive(Clone, Debug)]
pub struct CallerContext {
    pub actor_id: String,
    pub roles: RoleSet,
}

impl CallerContext {
    pub fn new<I, S>(actor_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            actor_id: actor_id.into(),
            roles: RoleSet::from_raw(roles),
        }
    }
}

/// What the server expects the intent to authorize.
#[derive(Clone, Debug)]
pub struct IntentBinding {
    pub expected_action: IntentAction,
    /// Required when `expected_action.requires_target()`.
    pub expected_target: Option<String>,
    /// Exact-match financial binding; `None` for non-financial actions.
    pub expected_amount: Option<Decimal>,
}

impl IntentBinding {
    pub fn action(expected_action: IntentAction) -> Self {
        Self {
            expected_action,
            expected_target: None,
            expected_amount: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.expected_target = Some(target.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.expected_amount = Some(amount);
        self
    }
}

// =============================================================================
// REPLAY RECORDS
// =============================================================================

/// Single-use nonce row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRecord {
    pub nonce: String,
    pub actor_id: String,
    pub tx_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NonceRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Durable receipt of a verified intent, unique per transaction id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionIntent {
    pub tx_id: String,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub action: IntentAction,
    pub target_id: Option<String>,
    pub content_hash: String,
    pub nonce: String,
    pub intent_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// The two rows a verified intent must insert, together, to be honored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayReservation {
    pub nonce: NonceRecord,
    pub intent: ActionIntent,
}

// =============================================================================
// VERIFIED INTENT
// =============================================================================

/// Output of the intent verifier.
///
/// Only the verifier can construct one, so holding a `VerifiedIntent` is
/// proof that binding, freshness and signature checks all passed.
#[derive(Clone, Debug)]
pub struct VerifiedIntent {
    pub(crate) content_hash: String,
    pub(crate) actor_id: String,
    pub(crate) actor_role: ActorRole,
    pub(crate) actor_key_id: String,
    pub(crate) signature: String,
    pub(crate) action: IntentAction,
    pub(crate) target_id: Option<String>,
    pub(crate) amount: Option<Decimal>,
    pub(crate) tx_id: String,
    pub(crate) nonce: String,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) reservation: ReplayReservation,
}

impl VerifiedIntent {
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn actor_role(&self) -> ActorRole {
        self.actor_role
    }

    pub fn actor_key_id(&self) -> &str {
        &self.actor_key_id
    }

    /// Base64 actor signature over the content hash.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn action(&self) -> IntentAction {
        self.action
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.amount
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn reservation(&self) -> &ReplayReservation {
        &self.reservation
    }
}
