//! Application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use paygrid_dunning::DunningService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Dunning engine (retry policy, run orchestration, audit, alerts)
    pub dunning: Arc<DunningService>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let dunning = Arc::new(DunningService::new(
            pool.clone(),
            config.ops_alert_webhook_url.clone(),
        ));
        Self {
            pool,
            config,
            dunning,
        }
    }
}
