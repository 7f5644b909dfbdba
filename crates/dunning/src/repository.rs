//! Data access for the dunning engine
//!
//! All reads and writes the engine performs against the organization and
//! invoice-failure tables live here. Writes that must commit together with
//! an audit entry take an open connection so the orchestrator can wrap them
//! in one transaction per organization.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{DunningError, DunningResult};
use paygrid_shared::types::{InvoiceFailure, Organization, SubscriptionStatus};

/// Repository over the organization and invoice-failure tables
#[derive(Clone)]
pub struct DunningRepository {
    pool: PgPool,
}

impl DunningRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List all organizations currently eligible for dunning evaluation
    ///
    /// This is the run's hard dependency: if this query fails, the run
    /// aborts before any mutation has happened.
    pub async fn list_past_due_organizations(&self) -> DunningResult<Vec<Organization>> {
        let orgs: Vec<Organization> = sqlx::query_as(
            r#"
            SELECT id, name, billing_email, subscription_status, created_at, updated_at
            FROM organizations
            WHERE subscription_status = 'past_due'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DunningError::CandidateListing(e.to_string()))?;

        Ok(orgs)
    }

    /// Most recently created `failed` invoice record for an organization
    ///
    /// Exactly one record per organization is considered per run. `None`
    /// means the organization is skipped as a no-op.
    pub async fn latest_failed_invoice(
        &self,
        organization_id: Uuid,
    ) -> DunningResult<Option<InvoiceFailure>> {
        let invoice: Option<InvoiceFailure> = sqlx::query_as(
            r#"
            SELECT id, organization_id, amount_due_cents, retry_count, status,
                   failed_at, created_at
            FROM invoice_failures
            WHERE organization_id = $1
              AND status = 'failed'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Increment the retry counter on an invoice failure record
    ///
    /// Runs on the caller's transaction so the increment and its audit entry
    /// commit as one unit. Returns the new retry count.
    pub async fn increment_retry_count(
        &self,
        conn: &mut PgConnection,
        invoice_id: Uuid,
    ) -> DunningResult<i32> {
        let new_count: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE invoice_failures
            SET retry_count = retry_count + 1
            WHERE id = $1
              AND status = 'failed'
            RETURNING retry_count
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(conn)
        .await?;

        new_count.ok_or_else(|| DunningError::InvoiceNotFound(invoice_id.to_string()))
    }

    /// Transition a `past_due` organization to `suspended`
    ///
    /// The status guard in the WHERE clause enforces the state machine: any
    /// other current status leaves zero rows affected and is an error, never
    /// a silent overwrite.
    pub async fn suspend_organization(
        &self,
        conn: &mut PgConnection,
        organization_id: Uuid,
    ) -> DunningResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET subscription_status = 'suspended',
                updated_at = NOW()
            WHERE id = $1
              AND subscription_status = 'past_due'
            "#,
        )
        .bind(organization_id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DunningError::InvalidStatus(format!(
                "Organization {} is not past_due; refusing to suspend",
                organization_id
            )));
        }

        tracing::info!(
            organization_id = %organization_id,
            "Organization suspended after exhausted payment retries"
        );

        Ok(())
    }

    /// Current subscription status for an organization
    pub async fn subscription_status(
        &self,
        organization_id: Uuid,
    ) -> DunningResult<SubscriptionStatus> {
        let status: Option<SubscriptionStatus> = sqlx::query_scalar(
            r#"
            SELECT subscription_status
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        status.ok_or_else(|| DunningError::OrganizationNotFound(organization_id.to_string()))
    }
}
