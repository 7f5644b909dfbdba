//! Paygrid Background Worker
//!
//! Handles scheduled jobs:
//! - Dunning run over past_due organizations (daily at 03:10 UTC)
//! - Health check heartbeat (every 5 minutes)
//!
//! The worker is the engine's external time trigger: it holds no in-process
//! retry timers of its own, it just invokes one full dunning pass per day.

use std::time::Duration;

use paygrid_dunning::{DunningConfig, DunningRun, DunningRunSummary};
use paygrid_shared::create_pool;
use time::OffsetDateTime;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Log the outcome of a dunning pass
fn log_run_summary(summary: &DunningRunSummary) {
    info!(
        processed = summary.processed,
        retries_scheduled = summary.retries_scheduled,
        suspensions_scheduled = summary.suspensions_scheduled,
        skipped_no_invoice = summary.skipped_no_invoice,
        errors = summary.errors,
        "Scheduled dunning run complete"
    );

    for line in &summary.notifications {
        info!(notification = %line, "Dunning action");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting Paygrid Worker");

    // Refuse to start on a malformed retry schedule; a worker silently
    // falling back to another policy is worse than one that is down
    let dunning_config = DunningConfig::from_env()?;
    info!(
        max_retries = dunning_config.max_retries,
        retry_intervals = ?dunning_config.retry_intervals,
        grace_period_days = dunning_config.grace_period_days,
        "Dunning policy configuration validated"
    );

    // Create database pool
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = create_pool(&database_url).await?;
    info!("Database pool created");

    let ops_webhook_url = std::env::var("OPS_ALERT_WEBHOOK_URL").ok();
    let dunning_run = DunningRun::new(pool.clone(), ops_webhook_url);

    // Create scheduler
    let scheduler = JobScheduler::new().await?;

    // Job 1: Daily dunning run (03:10 UTC, after the nightly billing sync
    // from the payment processor has landed)
    let job_run = dunning_run.clone();
    scheduler
        .add(Job::new_async("0 10 3 * * *", move |_uuid, _l| {
            let run = job_run.clone();
            Box::pin(async move {
                info!("Running scheduled dunning pass");

                // Reload the policy per invocation; it stays fixed for the
                // whole pass once loaded
                let config = match DunningConfig::from_env() {
                    Ok(c) => c,
                    Err(e) => {
                        error!(error = %e, "Skipping dunning pass: invalid configuration");
                        return;
                    }
                };

                match run.execute(&config, OffsetDateTime::now_utc()).await {
                    Ok(summary) => log_run_summary(&summary),
                    Err(e) => error!(error = %e, "Scheduled dunning run failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Dunning run (daily at 03:10 UTC)");

    // Job 2: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    // Start the scheduler
    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("Paygrid Worker started successfully with 2 scheduled jobs");

    // Keep the main task running; the scheduler runs jobs in background tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
