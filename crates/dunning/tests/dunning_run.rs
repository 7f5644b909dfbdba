//! Integration tests for the dunning run
//!
//! These tests exercise the full scan → evaluate → apply path against a
//! real Postgres database with the project migrations applied.
//!
//! ## Running Tests
//! ```bash
//! export DATABASE_URL="postgres://localhost/paygrid_test"
//! cargo test -p paygrid-dunning --test dunning_run -- --ignored --test-threads=1
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use paygrid_dunning::{DunningConfig, DunningRun};

// ============================================================================
// Test Utilities
// ============================================================================

/// Connect to the test database and build a run with the stock test config
async fn setup() -> (DunningRun, PgPool, DunningConfig) {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    let config = DunningConfig::new(3, vec![3, 5, 7], 14).expect("valid test config");
    let run = DunningRun::new(pool.clone(), None);
    (run, pool, config)
}

/// Create a past_due organization
async fn create_past_due_org(pool: &PgPool) -> Uuid {
    let org_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO organizations (id, name, billing_email, subscription_status, created_at, updated_at)
        VALUES ($1, $2, $3, 'past_due', NOW(), NOW())
        "#,
    )
    .bind(org_id)
    .bind(format!("Test Org {}", org_id))
    .bind(format!("billing-{}@example.com", org_id))
    .execute(pool)
    .await
    .expect("Failed to create test organization");
    org_id
}

/// Create a failed invoice record `days_ago` days in the past
async fn create_failed_invoice(pool: &PgPool, org_id: Uuid, retry_count: i32, days_ago: i64) -> Uuid {
    let invoice_id = Uuid::new_v4();
    let failed_at = OffsetDateTime::now_utc() - Duration::days(days_ago);
    sqlx::query(
        r#"
        INSERT INTO invoice_failures (
            id, organization_id, amount_due_cents, retry_count, status, failed_at, created_at
        )
        VALUES ($1, $2, 4900, $3, 'failed', $4, $4)
        "#,
    )
    .bind(invoice_id)
    .bind(org_id)
    .bind(retry_count)
    .bind(failed_at)
    .execute(pool)
    .await
    .expect("Failed to create test invoice failure");
    invoice_id
}

/// Remove everything the test created for one organization
async fn cleanup(pool: &PgPool, org_id: Uuid) {
    sqlx::query("DELETE FROM platform_notifications WHERE metadata->>'organization_id' = $1")
        .bind(org_id.to_string())
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM billing_changes WHERE organization_id = $1")
        .bind(org_id)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM invoice_failures WHERE organization_id = $1")
        .bind(org_id)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM organizations WHERE id = $1")
        .bind(org_id)
        .execute(pool)
        .await
        .ok();
}

async fn retry_count(pool: &PgPool, invoice_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT retry_count FROM invoice_failures WHERE id = $1")
        .bind(invoice_id)
        .fetch_one(pool)
        .await
        .expect("invoice row should exist")
}

async fn org_status(pool: &PgPool, org_id: Uuid) -> String {
    sqlx::query_scalar("SELECT subscription_status FROM organizations WHERE id = $1")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .expect("organization row should exist")
}

async fn audit_rows(pool: &PgPool, org_id: Uuid, change_type: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM billing_changes WHERE organization_id = $1 AND change_type = $2",
    )
    .bind(org_id)
    .bind(change_type)
    .fetch_one(pool)
    .await
    .expect("audit count query should succeed")
}

async fn notification_rows(pool: &PgPool, org_id: Uuid, severity: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM platform_notifications
        WHERE metadata->>'organization_id' = $1 AND severity = $2
        "#,
    )
    .bind(org_id.to_string())
    .bind(severity)
    .fetch_one(pool)
    .await
    .expect("notification count query should succeed")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn test_end_to_end_retry() {
    let (run, pool, config) = setup().await;
    let org_id = create_past_due_org(&pool).await;
    let invoice_id = create_failed_invoice(&pool, org_id, 1, 10).await;

    let summary = run
        .execute(&config, OffsetDateTime::now_utc())
        .await
        .expect("run should complete");

    assert!(summary.processed >= 1);
    assert_eq!(retry_count(&pool, invoice_id).await, 2);
    assert_eq!(org_status(&pool, org_id).await, "past_due");
    assert_eq!(audit_rows(&pool, org_id, "payment_retry").await, 1);
    assert_eq!(notification_rows(&pool, org_id, "warning").await, 1);
    assert!(summary
        .notifications
        .iter()
        .any(|n| n.contains("Payment retry 2/3")));

    cleanup(&pool, org_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_second_run_same_day_is_noop() {
    let (run, pool, config) = setup().await;
    let org_id = create_past_due_org(&pool).await;
    let invoice_id = create_failed_invoice(&pool, org_id, 0, 3).await;
    let as_of = OffsetDateTime::now_utc();

    run.execute(&config, as_of).await.expect("first run");
    assert_eq!(retry_count(&pool, invoice_id).await, 1);

    // Back-to-back run against unchanged inputs: the incremented counter no
    // longer satisfies the threshold that fired, so nothing happens
    run.execute(&config, as_of).await.expect("second run");
    assert_eq!(retry_count(&pool, invoice_id).await, 1);
    assert_eq!(audit_rows(&pool, org_id, "payment_retry").await, 1);
    assert_eq!(notification_rows(&pool, org_id, "warning").await, 1);

    cleanup(&pool, org_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_suspension_after_exhausted_retries() {
    let (run, pool, config) = setup().await;
    let org_id = create_past_due_org(&pool).await;
    let invoice_id = create_failed_invoice(&pool, org_id, 3, 14).await;

    let summary = run
        .execute(&config, OffsetDateTime::now_utc())
        .await
        .expect("run should complete");

    assert_eq!(summary.errors, 0);
    assert_eq!(org_status(&pool, org_id).await, "suspended");
    // Suspension never touches the retry counter
    assert_eq!(retry_count(&pool, invoice_id).await, 3);
    assert_eq!(audit_rows(&pool, org_id, "subscription_suspended").await, 1);
    assert_eq!(notification_rows(&pool, org_id, "critical").await, 1);

    // A suspended org is no longer a candidate: a second run is a no-op
    run.execute(&config, OffsetDateTime::now_utc())
        .await
        .expect("second run");
    assert_eq!(audit_rows(&pool, org_id, "subscription_suspended").await, 1);

    cleanup(&pool, org_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_no_suspension_within_grace_period() {
    let (run, pool, config) = setup().await;
    let org_id = create_past_due_org(&pool).await;
    let invoice_id = create_failed_invoice(&pool, org_id, 3, 13).await;

    run.execute(&config, OffsetDateTime::now_utc())
        .await
        .expect("run should complete");

    assert_eq!(org_status(&pool, org_id).await, "past_due");
    assert_eq!(retry_count(&pool, invoice_id).await, 3);
    assert_eq!(audit_rows(&pool, org_id, "subscription_suspended").await, 0);

    cleanup(&pool, org_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_org_without_invoice_does_not_block_others() {
    let (run, pool, config) = setup().await;
    let orphan_org = create_past_due_org(&pool).await;
    let due_org = create_past_due_org(&pool).await;
    let invoice_id = create_failed_invoice(&pool, due_org, 0, 3).await;

    let summary = run
        .execute(&config, OffsetDateTime::now_utc())
        .await
        .expect("run should complete");

    // The orphan is a counted no-op, not an error, and the due org still acts
    assert!(summary.skipped_no_invoice >= 1);
    assert_eq!(retry_count(&pool, invoice_id).await, 1);
    assert_eq!(org_status(&pool, orphan_org).await, "past_due");
    assert_eq!(audit_rows(&pool, orphan_org, "payment_retry").await, 0);

    cleanup(&pool, orphan_org).await;
    cleanup(&pool, due_org).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_retry_count_is_monotonic_across_runs() {
    let (run, pool, config) = setup().await;
    let org_id = create_past_due_org(&pool).await;
    let invoice_id = create_failed_invoice(&pool, org_id, 0, 3).await;

    let day = OffsetDateTime::now_utc();
    run.execute(&config, day).await.expect("run at day 3");
    assert_eq!(retry_count(&pool, invoice_id).await, 1);

    // Re-running with the same clock never decrements or double-increments
    run.execute(&config, day).await.expect("repeat run");
    assert_eq!(retry_count(&pool, invoice_id).await, 1);

    // Two days later the next threshold (5 days) is crossed
    run.execute(&config, day + Duration::days(2))
        .await
        .expect("run at day 5");
    assert_eq!(retry_count(&pool, invoice_id).await, 2);

    cleanup(&pool, org_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_run_writes_execution_log() {
    let (run, pool, config) = setup().await;

    let before: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_executions WHERE function_name = 'dunning_run'",
    )
    .fetch_one(&pool)
    .await
    .expect("count query");

    run.execute(&config, OffsetDateTime::now_utc())
        .await
        .expect("run should complete");

    let after: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_executions WHERE function_name = 'dunning_run'",
    )
    .fetch_one(&pool)
    .await
    .expect("count query");

    assert_eq!(after, before + 1);
}
