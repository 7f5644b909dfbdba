//! Dunning run orchestrator
//!
//! One run is one full pass over every `past_due` organization: load its
//! latest failed invoice, evaluate the retry policy, and apply the decision.
//! Each organization is processed in isolation: a failure for one is
//! caught, counted, and logged while the rest of the run continues. Only a
//! failure of the initial candidate listing aborts the run, and at that
//! point no mutation has happened yet.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::BillingChangeLog;
use crate::config::DunningConfig;
use crate::error::DunningResult;
use crate::notifications::{NotificationPayload, NotificationService};
use crate::policy::{self, RetryDecision};
use crate::repository::DunningRepository;
use paygrid_shared::types::{InvoiceFailure, Organization};

/// Summary of one dunning pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct DunningRunSummary {
    /// Organizations evaluated (candidates found by the listing query)
    pub processed: u32,
    /// Retry increments applied this pass
    pub retries_scheduled: u32,
    /// Suspensions applied this pass
    pub suspensions_scheduled: u32,
    /// Candidates with no `failed` invoice record (no-ops)
    pub skipped_no_invoice: u32,
    /// Candidates whose processing failed and was skipped
    pub errors: u32,
    /// Human-readable notification lines produced this pass
    pub notifications: Vec<String>,
}

/// Outcome of processing a single organization
enum OrgOutcome {
    NoAction,
    Retried(String),
    Suspended(String),
    SkippedNoInvoice,
}

/// Executes dunning passes
#[derive(Clone)]
pub struct DunningRun {
    pool: PgPool,
    repository: DunningRepository,
    audit: BillingChangeLog,
    notifications: NotificationService,
}

impl DunningRun {
    pub fn new(pool: PgPool, ops_webhook_url: Option<String>) -> Self {
        Self {
            repository: DunningRepository::new(pool.clone()),
            audit: BillingChangeLog::new(pool.clone()),
            notifications: NotificationService::new(pool.clone(), ops_webhook_url),
            pool,
        }
    }

    /// Execute one full dunning pass
    ///
    /// `config` is fixed for the whole pass; `as_of` is the policy clock,
    /// injectable so tests can cross day boundaries deterministically.
    pub async fn execute(
        &self,
        config: &DunningConfig,
        as_of: OffsetDateTime,
    ) -> DunningResult<DunningRunSummary> {
        let started_at = OffsetDateTime::now_utc();
        info!(
            max_retries = config.max_retries,
            grace_period_days = config.grace_period_days,
            "Starting dunning run"
        );

        let candidates = match self.repository.list_past_due_organizations().await {
            Ok(orgs) => orgs,
            Err(e) => {
                error!(error = %e, "Dunning run aborted: candidate listing failed");
                self.record_execution(&DunningRunSummary::default(), "failed", started_at)
                    .await;
                return Err(e);
            }
        };

        let mut summary = DunningRunSummary {
            processed: candidates.len() as u32,
            ..Default::default()
        };

        for org in &candidates {
            match self.process_organization(org, config, as_of).await {
                Ok(OrgOutcome::NoAction) => {}
                Ok(OrgOutcome::Retried(line)) => {
                    summary.retries_scheduled += 1;
                    summary.notifications.push(line);
                }
                Ok(OrgOutcome::Suspended(line)) => {
                    summary.suspensions_scheduled += 1;
                    summary.notifications.push(line);
                }
                Ok(OrgOutcome::SkippedNoInvoice) => summary.skipped_no_invoice += 1,
                Err(e) => {
                    summary.errors += 1;
                    error!(
                        organization_id = %org.id,
                        error = %e,
                        "Skipped organization due to error; run continues"
                    );
                }
            }
        }

        info!(
            processed = summary.processed,
            retries_scheduled = summary.retries_scheduled,
            suspensions_scheduled = summary.suspensions_scheduled,
            skipped_no_invoice = summary.skipped_no_invoice,
            errors = summary.errors,
            "Dunning run complete"
        );

        self.record_execution(&summary, "completed", started_at)
            .await;

        Ok(summary)
    }

    /// Evaluate and apply the policy for one organization
    ///
    /// The state mutation and its audit entry share one transaction; the
    /// platform notification goes out after commit, so a notification
    /// failure can never roll back the transition it describes.
    async fn process_organization(
        &self,
        org: &Organization,
        config: &DunningConfig,
        as_of: OffsetDateTime,
    ) -> DunningResult<OrgOutcome> {
        let Some(invoice) = self.repository.latest_failed_invoice(org.id).await? else {
            debug!(
                organization_id = %org.id,
                "past_due organization has no failed invoice record; skipping"
            );
            return Ok(OrgOutcome::SkippedNoInvoice);
        };

        let days_since_failure = policy::days_between(invoice.failed_at, as_of);
        let decision = policy::evaluate(invoice.retry_count, days_since_failure, config);

        debug!(
            organization_id = %org.id,
            invoice_id = %invoice.id,
            retry_count = invoice.retry_count,
            days_since_failure = days_since_failure,
            decision = ?decision,
            "Evaluated retry policy"
        );

        match decision {
            RetryDecision::NoActionYet => Ok(OrgOutcome::NoAction),
            RetryDecision::RetryNow => {
                self.apply_retry(org, &invoice, config, days_since_failure)
                    .await
            }
            RetryDecision::SuspendNow => {
                self.apply_suspension(org, &invoice, config, days_since_failure)
                    .await
            }
        }
    }

    async fn apply_retry(
        &self,
        org: &Organization,
        invoice: &InvoiceFailure,
        config: &DunningConfig,
        days_since_failure: i64,
    ) -> DunningResult<OrgOutcome> {
        let mut tx = self.pool.begin().await?;

        let new_count = self
            .repository
            .increment_retry_count(&mut *tx, invoice.id)
            .await?;
        self.audit
            .record_payment_retry(&mut *tx, org.id, new_count, days_since_failure)
            .await?;

        tx.commit().await?;

        info!(
            organization_id = %org.id,
            invoice_id = %invoice.id,
            attempt = new_count,
            max_retries = config.max_retries,
            "Payment retry scheduled"
        );

        let amount_dollars = invoice.amount_due_cents as f64 / 100.0;
        let message = format!(
            "Payment retry {}/{} scheduled for {} (${:.2} due)",
            new_count, config.max_retries, org.name, amount_dollars
        );
        let payload = NotificationPayload::PaymentRetryScheduled {
            organization_id: org.id,
            attempt: new_count,
            max_retries: config.max_retries,
            days_since_failure,
            amount_due_cents: invoice.amount_due_cents,
        };
        self.emit_notification(org.id, "Payment retry scheduled", &message, &payload)
            .await;

        Ok(OrgOutcome::Retried(message))
    }

    async fn apply_suspension(
        &self,
        org: &Organization,
        invoice: &InvoiceFailure,
        config: &DunningConfig,
        days_since_failure: i64,
    ) -> DunningResult<OrgOutcome> {
        // Snapshot from the scan; the status guard inside
        // suspend_organization catches anything that moved since
        let previous_status = org.subscription_status;

        let mut tx = self.pool.begin().await?;

        self.repository.suspend_organization(&mut *tx, org.id).await?;
        self.audit
            .record_suspension(
                &mut *tx,
                org.id,
                &previous_status.to_string(),
                days_since_failure,
            )
            .await?;

        tx.commit().await?;

        warn!(
            organization_id = %org.id,
            invoice_id = %invoice.id,
            retries_exhausted = config.max_retries,
            days_since_failure = days_since_failure,
            "Subscription suspended"
        );

        let message = format!(
            "{} suspended: {} retries exhausted, {} days past failure",
            org.name, config.max_retries, days_since_failure
        );
        let payload = NotificationPayload::SubscriptionSuspended {
            organization_id: org.id,
            previous_status: previous_status.to_string(),
            days_since_failure,
            retries_exhausted: config.max_retries,
        };
        self.emit_notification(org.id, "Subscription suspended", &message, &payload)
            .await;

        Ok(OrgOutcome::Suspended(message))
    }

    /// Emit a platform notification; failures are logged and swallowed so
    /// they never undo the committed state transition
    async fn emit_notification(
        &self,
        organization_id: Uuid,
        title: &str,
        message: &str,
        payload: &NotificationPayload,
    ) {
        if let Err(e) = self.notifications.emit(title, message, payload).await {
            error!(
                organization_id = %organization_id,
                error = %e,
                "Failed to persist platform notification"
            );
        }
    }

    /// Write the insert-only execution log row for this pass
    ///
    /// Log failures are not allowed to fail the run, so errors end up in the
    /// process log only.
    async fn record_execution(
        &self,
        summary: &DunningRunSummary,
        status: &str,
        started_at: OffsetDateTime,
    ) {
        let metadata = serde_json::json!({
            "processed": summary.processed,
            "retries_scheduled": summary.retries_scheduled,
            "suspensions_scheduled": summary.suspensions_scheduled,
            "skipped_no_invoice": summary.skipped_no_invoice,
            "errors": summary.errors,
        });

        let result = sqlx::query(
            r#"
            INSERT INTO job_executions (function_name, status, metadata, started_at, finished_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind("dunning_run")
        .bind(status)
        .bind(metadata)
        .bind(started_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(error = %e, "Failed to write dunning run execution log");
        }
    }
}

impl DunningRunSummary {
    /// Whether the pass changed any state
    pub fn acted(&self) -> bool {
        self.retries_scheduled > 0 || self.suspensions_scheduled > 0
    }
}
