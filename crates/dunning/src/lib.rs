// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Paygrid Dunning Module
//!
//! Drives organizations with failed recurring payments through a bounded
//! retry schedule and suspends access when the retry budget and grace
//! period are exhausted.
//!
//! ## Features
//!
//! - **Retry Policy**: pure, deterministic decision function over
//!   `(retry_count, days_since_failure, config)`
//! - **Dunning Run**: scheduled pass over `past_due` organizations with
//!   per-organization isolation and an execution-log summary
//! - **Audit Trail**: append-only billing change records committed
//!   atomically with each state transition
//! - **Notifications**: operator-facing alerts with typed payloads, plus
//!   an optional ops webhook mirror

pub mod audit;
pub mod config;
pub mod error;
pub mod notifications;
pub mod policy;
pub mod repository;
pub mod run;

// Audit
pub use audit::{BillingChange, BillingChangeLog, BillingChangeType};

// Config
pub use config::{DunningConfig, DunningConfigError};

// Error
pub use error::{DunningError, DunningResult};

// Notifications
pub use notifications::{NotificationPayload, NotificationService, OpsWebhook};

// Policy
pub use policy::{days_between, evaluate, RetryDecision};

// Repository
pub use repository::DunningRepository;

// Run
pub use run::{DunningRun, DunningRunSummary};

use sqlx::PgPool;

/// Main dunning service combining the engine's parts
pub struct DunningService {
    pub repository: DunningRepository,
    pub audit: BillingChangeLog,
    pub notifications: NotificationService,
    pub run: DunningRun,
}

impl DunningService {
    /// Create a dunning service; `ops_webhook_url` mirrors notifications to
    /// an operator channel when set
    pub fn new(pool: PgPool, ops_webhook_url: Option<String>) -> Self {
        Self {
            repository: DunningRepository::new(pool.clone()),
            audit: BillingChangeLog::new(pool.clone()),
            notifications: NotificationService::new(pool.clone(), ops_webhook_url.clone()),
            run: DunningRun::new(pool, ops_webhook_url),
        }
    }

    /// Create a dunning service from environment variables
    /// (`OPS_ALERT_WEBHOOK_URL` is optional)
    pub fn from_env(pool: PgPool) -> Self {
        let webhook_url = std::env::var("OPS_ALERT_WEBHOOK_URL").ok();
        Self::new(pool, webhook_url)
    }
}
