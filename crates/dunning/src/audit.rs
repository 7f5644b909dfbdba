//! Billing change audit log
//!
//! Append-only record of every state transition the engine performs.
//! Entries are written on the same transaction as the state mutation they
//! describe: a retry increment or a suspension either commits together with
//! its audit entry or not at all.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::DunningResult;

/// Types of billing changes the engine records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingChangeType {
    PaymentRetry,
    SubscriptionSuspended,
}

impl std::fmt::Display for BillingChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BillingChangeType::PaymentRetry => "payment_retry",
            BillingChangeType::SubscriptionSuspended => "subscription_suspended",
        };
        write!(f, "{}", s)
    }
}

/// A billing change record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingChange {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub change_type: String,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Service for writing and querying billing change records
#[derive(Clone)]
pub struct BillingChangeLog {
    pool: PgPool,
}

impl BillingChangeLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a retry audit entry on the caller's transaction
    pub async fn record_payment_retry(
        &self,
        conn: &mut PgConnection,
        organization_id: Uuid,
        attempt: i32,
        days_since_failure: i64,
    ) -> DunningResult<Uuid> {
        self.insert(
            conn,
            organization_id,
            BillingChangeType::PaymentRetry,
            Some((attempt - 1).to_string()),
            Some(attempt.to_string()),
            format!(
                "Payment retry attempt {} scheduled, {} days after failure",
                attempt, days_since_failure
            ),
        )
        .await
    }

    /// Append a suspension audit entry on the caller's transaction
    pub async fn record_suspension(
        &self,
        conn: &mut PgConnection,
        organization_id: Uuid,
        previous_status: &str,
        days_since_failure: i64,
    ) -> DunningResult<Uuid> {
        self.insert(
            conn,
            organization_id,
            BillingChangeType::SubscriptionSuspended,
            Some(previous_status.to_string()),
            Some("suspended".to_string()),
            format!(
                "Subscription suspended after exhausted retries, {} days after failure",
                days_since_failure
            ),
        )
        .await
    }

    async fn insert(
        &self,
        conn: &mut PgConnection,
        organization_id: Uuid,
        change_type: BillingChangeType,
        previous_value: Option<String>,
        new_value: Option<String>,
        notes: String,
    ) -> DunningResult<Uuid> {
        let change_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO billing_changes (
                organization_id, change_type, previous_value, new_value, notes
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(organization_id)
        .bind(change_type.to_string())
        .bind(previous_value)
        .bind(new_value)
        .bind(notes)
        .fetch_one(conn)
        .await?;

        Ok(change_id)
    }

    /// Recent billing changes for an organization, newest first
    pub async fn changes_for_organization(
        &self,
        organization_id: Uuid,
        limit: i64,
    ) -> DunningResult<Vec<BillingChange>> {
        let changes: Vec<BillingChange> = sqlx::query_as(
            r#"
            SELECT id, organization_id, change_type, previous_value, new_value,
                   notes, created_at
            FROM billing_changes
            WHERE organization_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(organization_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(changes)
    }
}
