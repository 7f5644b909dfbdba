//! Common types used across Paygrid

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Organization ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub Uuid);

impl OrgId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrgId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for OrgId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Invoice failure record ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceFailureId(pub Uuid);

impl InvoiceFailureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvoiceFailureId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for InvoiceFailureId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Subscription lifecycle status for an organization
///
/// Only `past_due` organizations are eligible for dunning evaluation, and
/// only `past_due` may transition to `suspended` (via exhausted retries).
/// Recovery out of `suspended` is a manual operation outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Suspended,
    Cancelled,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl SubscriptionStatus {
    /// Whether the dunning engine should evaluate this organization
    pub fn is_dunning_candidate(&self) -> bool {
        matches!(self, Self::PastDue)
    }

    /// Whether the organization currently has service access
    pub fn has_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing | Self::PastDue)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Trialing => write!(f, "trialing"),
            Self::PastDue => write!(f, "past_due"),
            Self::Suspended => write!(f, "suspended"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" => Ok(Self::PastDue),
            "suspended" => Ok(Self::Suspended),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

/// Status of an invoice failure record
///
/// `failed` records are the dunning engine's input. The payment webhook
/// collaborator flips a record to `paid` when a retry (or a manual payment)
/// succeeds; this engine never writes the status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceFailureStatus {
    Failed,
    Paid,
}

impl Default for InvoiceFailureStatus {
    fn default() -> Self {
        Self::Failed
    }
}

impl std::fmt::Display for InvoiceFailureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::Paid => write!(f, "paid"),
        }
    }
}

impl std::str::FromStr for InvoiceFailureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "failed" => Ok(Self::Failed),
            "paid" => Ok(Self::Paid),
            _ => Err(format!("Invalid invoice failure status: {}", s)),
        }
    }
}

/// Severity of an operator-facing platform notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// Organization (tenant) model
///
/// Owned by the account-management system. The dunning engine reads
/// identity/contact fields and writes `subscription_status` only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub billing_email: String,
    pub subscription_status: SubscriptionStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A durable record of one failed billing attempt
///
/// Created by the payment-processor webhook; this engine only ever
/// increments `retry_count`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceFailure {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub amount_due_cents: i64,
    pub retry_count: i32,
    pub status: InvoiceFailureStatus,
    pub failed_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}
