//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (hub accepting connections)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 503 once the hub has begun shutting down.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.hub.is_stopped() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.hub.stats();
    let status = if state.hub.is_stopped() {
        "stopping"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        server_status: stats.server_status,
        connected_clients: stats.connected_clients,
        total_errors: stats.total_errors,
        uptime_seconds: state.uptime_seconds(),
        version: crate::SERVER_VERSION.to_string(),
    })
}
