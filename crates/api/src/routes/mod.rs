//! API routes

pub mod dunning;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Internal job routes, called by the external scheduler
    let job_routes = Router::new().route("/internal/jobs/dunning", post(dunning::trigger_dunning));

    Router::new()
        .merge(health_routes)
        .merge(job_routes)
        .with_state(state)
}
