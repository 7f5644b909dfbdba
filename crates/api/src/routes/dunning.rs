//! Dunning trigger route
//!
//! Single entry point for the external scheduler (and for manual/test
//! invocation). The request body is optional and has no required fields; an
//! `asOf` override makes a manual run deterministic.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{error::ApiError, state::AppState};
use paygrid_dunning::DunningConfig;

/// Optional body for manual/test invocation
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDunningRequest {
    /// Policy clock override; defaults to now (UTC)
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub as_of: Option<OffsetDateTime>,
}

/// Response for a completed dunning run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DunningRunResponse {
    pub success: bool,
    pub processed: u32,
    pub retries_scheduled: u32,
    pub suspensions_scheduled: u32,
    pub notifications: Vec<String>,
}

/// Execute one dunning pass
///
/// The policy configuration is loaded once here and handed to the run as an
/// immutable value, so every organization in the pass sees the same policy.
pub async fn trigger_dunning(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<TriggerDunningRequest>>,
) -> Result<Json<DunningRunResponse>, ApiError> {
    authorize_scheduler(&state, &headers)?;

    let config = DunningConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Refusing dunning run: invalid configuration");
        ApiError::DunningRunFailed(format!("Invalid dunning configuration: {}", e))
    })?;

    let as_of = body
        .and_then(|Json(req)| req.as_of)
        .unwrap_or_else(OffsetDateTime::now_utc);

    let summary = state.dunning.run.execute(&config, as_of).await.map_err(|e| {
        tracing::error!(error = %e, "Dunning run failed");
        ApiError::DunningRunFailed(e.to_string())
    })?;

    Ok(Json(DunningRunResponse {
        success: true,
        processed: summary.processed,
        retries_scheduled: summary.retries_scheduled,
        suspensions_scheduled: summary.suspensions_scheduled,
        notifications: summary.notifications,
    }))
}

/// Require the scheduler bearer token when one is configured
fn authorize_scheduler(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(ref token) = state.config.scheduler_token else {
        return Ok(());
    };

    let authorized = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h == format!("Bearer {}", token))
        .unwrap_or(false);

    if authorized {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}
