//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,
    pub database_direct_url: Option<String>,

    // Operator alerting
    pub ops_alert_webhook_url: Option<String>,

    // Scheduler authentication: when set, the dunning trigger requires this
    // bearer token (the external scheduler is the only intended caller)
    pub scheduler_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_direct_url: env::var("DATABASE_DIRECT_URL").ok(),

            // Operator alerting
            ops_alert_webhook_url: env::var("OPS_ALERT_WEBHOOK_URL").ok(),

            // Scheduler authentication
            scheduler_token: env::var("SCHEDULER_TOKEN").ok(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (they modify shared env vars)
    static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_missing_database_url_fails() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();
        env::remove_var("DATABASE_URL");

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_defaults_applied() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();
        env::set_var("DATABASE_URL", "postgres://test");
        env::remove_var("BIND_ADDRESS");
        env::remove_var("SCHEDULER_TOKEN");

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert!(config.scheduler_token.is_none());

        env::remove_var("DATABASE_URL");
    }
}
