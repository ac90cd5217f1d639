//! Capture Routes
//!
//! Producer ingress over HTTP.
//!
//! - POST /api/v1/errors - Report one error
//! - GET /api/v1/errors/summary - Counts by type and severity

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::CaptureResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::event::RawError;
use crate::websocket::ErrorSummary;

/// POST /api/v1/errors
///
/// Validate, analyze and broadcast a single error report.
pub async fn capture_error(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawError>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CaptureResponse>)> {
    let Json(raw) = payload?;

    if state.hub.is_stopped() {
        return Err(ApiError::ServiceUnavailable(
            "error stream is shutting down".to_string(),
        ));
    }

    let analyzed = state.hub.capture(raw).await?;

    Ok((StatusCode::CREATED, Json(CaptureResponse::from(&analyzed))))
}

/// GET /api/v1/errors/summary
pub async fn error_summary(State(state): State<Arc<AppState>>) -> Json<ErrorSummary> {
    Json(state.hub.summary().await)
}
