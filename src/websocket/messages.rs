//! WebSocket Message Types
//!
//! Defines all message types for WebSocket communication between
//! subscribers and the errorcast server.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::hub::HubError;
use super::stats::StatsSnapshot;
use crate::event::{AnalyzedEvent, Context, Severity, Urgency};

/// Wildcard accepted in either filter dimension
pub const WILDCARD: &str = "all";

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Install or replace the connection's filter
    Subscribe {
        /// Client-side send time, informational only
        #[serde(default)]
        timestamp: Option<String>,
        /// Missing filters mean "all" on both dimensions
        #[serde(default)]
        filters: Option<FilterSpec>,
    },
    /// Drop the current filter; no events are delivered until resubscribing
    Unsubscribe,
    /// Ping for keepalive
    Ping,
    /// Request a statistics snapshot for this connection only
    GetStats,
    /// Any message type this server does not know about
    #[serde(other)]
    Unknown,
}

/// Filter as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default = "wildcard_list")]
    pub error_types: Vec<String>,
    #[serde(default = "wildcard_list")]
    pub severity_levels: Vec<String>,
}

fn wildcard_list() -> Vec<String> {
    vec![WILDCARD.to_string()]
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            error_types: wildcard_list(),
            severity_levels: wildcard_list(),
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection
    ConnectionEstablished {
        message: String,
        server_version: String,
        connection_id: String,
    },
    /// Subscription accepted; echoes the effective filter
    SubscriptionConfirmed { filters: FilterSpec },
    /// Filter removed
    Unsubscribed,
    /// A captured error matching the connection's filter
    FlutterError { event: EventPayload },
    /// Periodic statistics broadcast
    StreamingStats { stats: StatsSnapshot },
    /// Pong response to ping
    Pong,
    /// Error message
    Error { message: String },
}

impl ServerMessage {
    /// Serialize once into a payload that can be shared across queues
    pub fn encode(&self) -> Result<Arc<str>, HubError> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }

    pub fn connection_established(connection_id: &str) -> Self {
        ServerMessage::ConnectionEstablished {
            message: "Connected to errorcast real-time error stream".to_string(),
            server_version: crate::SERVER_VERSION.to_string(),
            connection_id: connection_id.to_string(),
        }
    }
}

impl From<&AnalyzedEvent> for ServerMessage {
    fn from(analyzed: &AnalyzedEvent) -> Self {
        ServerMessage::FlutterError {
            event: EventPayload::from(analyzed),
        }
    }
}

/// `event` object of a `flutter_error` message
#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub id: String,
    pub error: ErrorPayload,
    #[serde(rename = "capturedAt")]
    pub captured_at: String,
    #[serde(rename = "autoAnalysis")]
    pub auto_analysis: String,
    pub urgency: Urgency,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
}

/// `event.error` object of a `flutter_error` message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_type: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Context::is_empty")]
    pub context: Context,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl From<&AnalyzedEvent> for EventPayload {
    fn from(analyzed: &AnalyzedEvent) -> Self {
        let event = analyzed.event();
        Self {
            id: event.id().to_string(),
            error: ErrorPayload {
                error_type: event.error_type().to_string(),
                severity: event.severity(),
                message: event.message().to_string(),
                context: event.context().clone(),
                stack_trace: event.stack_trace().map(str::to_string),
            },
            captured_at: event.captured_at().to_rfc3339(),
            auto_analysis: analyzed.auto_analysis().to_string(),
            urgency: analyzed.urgency(),
            suggested_actions: analyzed.suggested_actions().to_vec(),
        }
    }
}
