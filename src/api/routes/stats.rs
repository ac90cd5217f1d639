//! Stats Routes
//!
//! - GET /api/v1/stats - Same snapshot subscribers receive as `streaming_stats`

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::websocket::StatsSnapshot;

/// GET /api/v1/stats
pub async fn streaming_stats(State(state): State<Arc<AppState>>) -> Json<StatsSnapshot> {
    Json(state.hub.stats())
}
