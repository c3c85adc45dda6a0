//! Health check endpoints
//!
//! Health check endpoints for monitoring and container orchestration.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::keys::KeyStore as _;
use crate::server::state::AppState;

/// Response for the main health check endpoint
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
}

/// Response for readiness probe
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub config_loaded: bool,
    pub key_store: bool,
}

/// Response for liveness probe
#[derive(Serialize)]
pub struct LivenessResponse {
    pub alive: bool,
}

/// Main health check endpoint
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.settings.app_version.clone(),
        environment: state.settings.environment.to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Readiness probe endpoint
///
/// Used by load balancers to decide whether this instance should receive
/// traffic.
///
/// GET /ready
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    // The store probe is a cheap owner listing; an unreachable backend
    // surfaces here before it surfaces as auth 500s.
    let key_store = state.key_store.list_for_owner("readiness-probe").await.is_ok();

    let checks = ReadinessChecks {
        config_loaded: true,
        key_store,
    };

    let ready = checks.config_loaded && checks.key_store;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    if !ready {
        tracing::warn!(checks = ?checks, "Service not ready");
    }

    (status, Json(ReadinessResponse { ready, checks }))
}

/// Liveness probe endpoint
///
/// GET /liveness
pub async fn liveness() -> Json<LivenessResponse> {
    // If we can respond, we're alive
    Json(LivenessResponse { alive: true })
}
