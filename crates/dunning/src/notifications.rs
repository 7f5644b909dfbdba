//! Operator-facing platform notifications
//!
//! Every retry and every suspension produces a human-readable notification
//! row. Metadata is a tagged union of the known payload shapes rather than a
//! free-form map, so the persisted JSON always round-trips to a known type.
//! An optional ops webhook mirrors each notification; delivery failure is
//! logged and never blocks or rolls back the state mutation it describes.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DunningResult;
use paygrid_shared::types::Severity;

/// Typed metadata attached to a platform notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationPayload {
    PaymentRetryScheduled {
        organization_id: Uuid,
        attempt: i32,
        max_retries: u32,
        days_since_failure: i64,
        amount_due_cents: i64,
    },
    SubscriptionSuspended {
        organization_id: Uuid,
        previous_status: String,
        days_since_failure: i64,
        retries_exhausted: u32,
    },
}

impl NotificationPayload {
    /// Stable type tag persisted in the `notification_type` column
    pub fn notification_type(&self) -> &'static str {
        match self {
            Self::PaymentRetryScheduled { .. } => "billing_payment_retry",
            Self::SubscriptionSuspended { .. } => "billing_subscription_suspended",
        }
    }

    /// Severity the payload maps to
    pub fn severity(&self) -> Severity {
        match self {
            Self::PaymentRetryScheduled { .. } => Severity::Warning,
            Self::SubscriptionSuspended { .. } => Severity::Critical,
        }
    }
}

/// Service for emitting platform notifications
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
    webhook: OpsWebhook,
}

impl NotificationService {
    pub fn new(pool: PgPool, ops_webhook_url: Option<String>) -> Self {
        Self {
            pool,
            webhook: OpsWebhook::new(ops_webhook_url),
        }
    }

    /// Emit one notification: persist the row, then mirror to the ops
    /// webhook fire-and-forget
    pub async fn emit(
        &self,
        title: &str,
        message: &str,
        payload: &NotificationPayload,
    ) -> DunningResult<Uuid> {
        let severity = payload.severity();
        let metadata = serde_json::to_value(payload).unwrap_or_else(|_| json!({}));

        let notification_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO platform_notifications (
                notification_type, severity, title, message, metadata
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(payload.notification_type())
        .bind(severity.as_str())
        .bind(title)
        .bind(message)
        .bind(&metadata)
        .fetch_one(&self.pool)
        .await?;

        // Mirror to the ops channel without holding up the run
        let webhook = self.webhook.clone();
        let title = title.to_string();
        let message = message.to_string();
        tokio::spawn(async move {
            if let Err(e) = webhook.send(severity, &title, &message).await {
                tracing::error!(
                    notification_id = %notification_id,
                    error = ?e,
                    "Failed to deliver ops webhook notification"
                );
            }
        });

        Ok(notification_id)
    }
}

/// Ops webhook notifier (Slack-compatible payload)
#[derive(Clone)]
pub struct OpsWebhook {
    webhook_url: Option<String>,
}

impl OpsWebhook {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self { webhook_url }
    }

    /// Send a notification to the ops channel
    pub async fn send(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Some(ref webhook_url) = self.webhook_url else {
            tracing::debug!("Ops webhook URL not configured, skipping notification");
            return Ok(());
        };

        let (emoji, color) = match severity {
            Severity::Critical => (":rotating_light:", "#FF0000"),
            Severity::Warning => (":warning:", "#FFA500"),
        };

        let payload = json!({
            "text": format!("{} *Billing Alert: {}*", emoji, title),
            "attachments": [{
                "color": color,
                "fields": [
                    {
                        "title": "Severity",
                        "value": severity.as_str(),
                        "short": true
                    },
                    {
                        "title": "Details",
                        "value": message,
                        "short": false
                    }
                ],
                "footer": "Paygrid Dunning Engine"
            }]
        });

        let client = reqwest::Client::new();
        let response = client.post(webhook_url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                "Ops webhook returned an error"
            );
            return Err(format!("Ops webhook returned {}: {}", status, body).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_severity_mapping() {
        let retry = NotificationPayload::PaymentRetryScheduled {
            organization_id: Uuid::new_v4(),
            attempt: 1,
            max_retries: 3,
            days_since_failure: 3,
            amount_due_cents: 4900,
        };
        assert_eq!(retry.severity(), Severity::Warning);
        assert_eq!(retry.notification_type(), "billing_payment_retry");

        let suspended = NotificationPayload::SubscriptionSuspended {
            organization_id: Uuid::new_v4(),
            previous_status: "past_due".to_string(),
            days_since_failure: 14,
            retries_exhausted: 3,
        };
        assert_eq!(suspended.severity(), Severity::Critical);
        assert_eq!(
            suspended.notification_type(),
            "billing_subscription_suspended"
        );
    }

    #[test]
    fn test_payload_serializes_tagged() {
        let payload = NotificationPayload::PaymentRetryScheduled {
            organization_id: Uuid::nil(),
            attempt: 2,
            max_retries: 3,
            days_since_failure: 5,
            amount_due_cents: 1900,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "payment_retry_scheduled");
        assert_eq!(value["attempt"], 2);

        let back: NotificationPayload = serde_json::from_value(value).unwrap();
        assert!(matches!(
            back,
            NotificationPayload::PaymentRetryScheduled { attempt: 2, .. }
        ));
    }
}
