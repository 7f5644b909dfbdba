//! Dunning policy configuration
//!
//! The configuration is loaded once at run start and passed into the
//! orchestrator as an explicit value; it is never mutated mid-run, so every
//! organization processed in one pass sees the same policy.

use std::env;

/// Policy parameters for one dunning pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DunningConfig {
    /// Maximum number of automated retries before an invoice is exhausted
    pub max_retries: u32,
    /// Days-since-failure thresholds, one per retry attempt. When
    /// `retry_count` runs past the end, the last entry is the fallback.
    pub retry_intervals: Vec<u32>,
    /// Total days after the original failure after which an exhausted
    /// invoice leads to suspension
    pub grace_period_days: u32,
}

impl DunningConfig {
    /// Build a config, enforcing the load-time preconditions
    pub fn new(
        max_retries: u32,
        retry_intervals: Vec<u32>,
        grace_period_days: u32,
    ) -> Result<Self, DunningConfigError> {
        let config = Self {
            max_retries,
            retry_intervals,
            grace_period_days,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// - `DUNNING_MAX_RETRIES` (default: 3)
    /// - `DUNNING_RETRY_INTERVALS` (comma-separated days, default: "3,5,7")
    /// - `DUNNING_GRACE_PERIOD_DAYS` (default: 14)
    pub fn from_env() -> Result<Self, DunningConfigError> {
        let max_retries = env::var("DUNNING_MAX_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|_| DunningConfigError::Invalid("DUNNING_MAX_RETRIES must be an integer"))?;

        let retry_intervals = env::var("DUNNING_RETRY_INTERVALS")
            .unwrap_or_else(|_| "3,5,7".to_string())
            .split(',')
            .map(|s| {
                s.trim().parse().map_err(|_| {
                    DunningConfigError::Invalid(
                        "DUNNING_RETRY_INTERVALS must be comma-separated integers",
                    )
                })
            })
            .collect::<Result<Vec<u32>, _>>()?;

        let grace_period_days = env::var("DUNNING_GRACE_PERIOD_DAYS")
            .unwrap_or_else(|_| "14".to_string())
            .parse()
            .map_err(|_| {
                DunningConfigError::Invalid("DUNNING_GRACE_PERIOD_DAYS must be an integer")
            })?;

        Self::new(max_retries, retry_intervals, grace_period_days)
    }

    /// Validate the load-time preconditions
    ///
    /// An empty retry schedule or a zero retry budget would make the policy
    /// meaningless, so the run refuses to start instead of defaulting.
    fn validate(&self) -> Result<(), DunningConfigError> {
        if self.max_retries == 0 {
            return Err(DunningConfigError::Invalid(
                "max_retries must be at least 1",
            ));
        }
        if self.retry_intervals.is_empty() {
            return Err(DunningConfigError::Invalid(
                "retry_intervals must not be empty",
            ));
        }
        if self.retry_intervals.len() < self.max_retries as usize {
            tracing::warn!(
                intervals = self.retry_intervals.len(),
                max_retries = self.max_retries,
                "Retry interval schedule shorter than retry budget; last interval will be reused"
            );
        }
        Ok(())
    }
}

impl Default for DunningConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_intervals: vec![3, 5, 7],
            grace_period_days: 14,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DunningConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid dunning configuration: {0}")]
    Invalid(&'static str),
}
