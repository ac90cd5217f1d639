//! Data Transfer Objects
//!
//! Response types for the HTTP endpoints. Requests reuse
//! [`RawError`](crate::event::RawError) directly.

use serde::Serialize;

use crate::event::{AnalyzedEvent, Urgency};
use crate::websocket::ServerStatus;

/// Response for an accepted error report
#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub id: String,
    pub urgency: Urgency,
    #[serde(rename = "autoAnalysis")]
    pub auto_analysis: String,
    pub suggested_actions: Vec<String>,
}

impl From<&AnalyzedEvent> for CaptureResponse {
    fn from(analyzed: &AnalyzedEvent) -> Self {
        Self {
            id: analyzed.id().to_string(),
            urgency: analyzed.urgency(),
            auto_analysis: analyzed.auto_analysis().to_string(),
            suggested_actions: analyzed.suggested_actions().to_vec(),
        }
    }
}

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "stopping"
    pub status: String,
    pub server_status: ServerStatus,
    pub connected_clients: usize,
    pub total_errors: u64,
    pub uptime_seconds: u64,
    pub version: String,
}
