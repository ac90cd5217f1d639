//! # errorcast
//!
//! Real-time error streaming - captures runtime errors from an application,
//! analyzes them, and pushes them to live WebSocket subscribers.
//!
//! ## Features
//!
//! - **Validated capture**: Immutable error events with generated ids
//! - **Automatic analysis**: Urgency, a short summary and suggested actions
//! - **Filtered fan-out**: Per-subscriber error type and severity filters
//! - **Backpressure**: Bounded per-connection queues, slow clients are dropped
//! - **Periodic stats**: `streaming_stats` pushed to every open connection
//!
//! ## Modules
//!
//! - [`event`]: Error event model and validation
//! - [`analyzer`]: Urgency and suggested actions for an event
//! - [`websocket`]: Subscription registry, broadcast hub, connection lifecycle
//! - [`api`]: HTTP and WebSocket server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use errorcast::event::{RawError, Severity};
//! use errorcast::websocket::{BroadcastHub, HubConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Arc::new(BroadcastHub::new(HubConfig::default()));
//!     let stats_task = Arc::clone(&hub).start_stats_broadcast();
//!
//!     let analyzed = hub
//!         .capture(
//!             RawError::new("network", "Connection refused")
//!                 .severity(Severity::Error)
//!                 .context("apiEndpoint", "/api/users"),
//!         )
//!         .await?;
//!
//!     println!("{} -> {}", analyzed.id(), analyzed.urgency());
//!
//!     hub.shutdown().await;
//!     stats_task.await?;
//!
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod api;
pub mod config;
pub mod event;
pub mod websocket;

/// Version reported in `connection_established` and `/health`
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export top-level types for convenience
pub use event::{
    AnalyzedEvent, CaptureError, CaptureResult, Context, ContextValue, ErrorEvent, RawError,
    Severity, Urgency,
};

pub use analyzer::{analyze, urgency_for};

pub use api::{build_router, serve, serve_on, ApiError, AppState};

pub use websocket::{
    BroadcastHub, ClientMessage, ConnectionManager, ErrorSummary, Filter, HubConfig, HubError,
    ServerMessage, ServerStatus, StatsSnapshot, SubscriptionRegistry, websocket_handler,
};

pub use config::{Config, ConfigError, LoadReport, LoggingConfig, ServerConfig, StreamingConfig};
