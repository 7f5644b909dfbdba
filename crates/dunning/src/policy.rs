//! Retry decision policy
//!
//! Pure, deterministic decision logic: given the current retry count, the
//! calendar days elapsed since the original failure, and the policy
//! configuration, decide what the run should do for one organization. All
//! side effects live in the orchestrator; this module never touches the
//! database or the clock.

use serde::Serialize;
use time::OffsetDateTime;

use crate::config::DunningConfig;

/// Outcome of evaluating one invoice failure against the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryDecision {
    /// Nothing is due today
    NoActionYet,
    /// The next retry threshold has been crossed
    RetryNow,
    /// The retry budget is exhausted and the grace period has elapsed
    SuspendNow,
}

/// Evaluate the retry policy for one invoice failure
///
/// Deterministic in its inputs: the same `(retry_count, days_since_failure,
/// config)` always yields the same decision, which is what makes a repeated
/// run within the same day a no-op (the first run increments `retry_count`,
/// so the second no longer crosses the threshold that fired).
pub fn evaluate(retry_count: i32, days_since_failure: i64, config: &DunningConfig) -> RetryDecision {
    if retry_count < 0 {
        // Counters below zero cannot occur through this engine; treat as 0
        return evaluate(0, days_since_failure, config);
    }

    if (retry_count as u32) < config.max_retries {
        let threshold = interval_for(retry_count as usize, config);
        if days_since_failure >= i64::from(threshold) {
            RetryDecision::RetryNow
        } else {
            RetryDecision::NoActionYet
        }
    } else if days_since_failure >= i64::from(config.grace_period_days) {
        RetryDecision::SuspendNow
    } else {
        RetryDecision::NoActionYet
    }
}

/// Threshold (days since failure) for the retry attempt at `index`
///
/// When the schedule is shorter than the retry budget, the last entry is
/// reused for the remaining attempts. The config is validated non-empty at
/// load time, so the fallback always exists.
fn interval_for(index: usize, config: &DunningConfig) -> u32 {
    config
        .retry_intervals
        .get(index)
        .or_else(|| config.retry_intervals.last())
        .copied()
        .unwrap_or(u32::MAX)
}

/// Whole calendar days between two instants, UTC
///
/// Day-boundary truncation, not a 24-hour modulus: a failure at 23:50 UTC is
/// one day old at 00:00 UTC ten minutes later. Negative spans (failure
/// recorded in the future relative to `as_of`) clamp to zero.
pub fn days_between(failed_at: OffsetDateTime, as_of: OffsetDateTime) -> i64 {
    let failed = failed_at.to_offset(time::UtcOffset::UTC).date();
    let now = as_of.to_offset(time::UtcOffset::UTC).date();
    let days = i64::from(now.to_julian_day()) - i64::from(failed.to_julian_day());
    days.max(0)
}
