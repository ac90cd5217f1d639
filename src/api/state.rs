//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::config::Config;
use crate::websocket::{BroadcastHub, HubConfig};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Broadcast hub shared by the HTTP capture route and WebSocket sessions
    pub hub: Arc<BroadcastHub>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState around an existing hub
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self {
            hub,
            start_time: Instant::now(),
        }
    }

    /// Create AppState with a fresh hub built from the `[streaming]` section
    pub fn from_config(config: &Config) -> Self {
        let hub = BroadcastHub::new(HubConfig::from(&config.streaming));
        Self::new(Arc::new(hub))
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(BroadcastHub::new(HubConfig::default())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_config_applies_streaming_section() {
        let mut config = Config::default();
        config.streaming.max_connections = 7;
        config.streaming.outbound_queue_capacity = 32;
        config.streaming.send_timeout_ms = 250;

        let state = AppState::from_config(&config);
        let hub_config = state.hub.config();
        assert_eq!(hub_config.max_connections, 7);
        assert_eq!(hub_config.outbound_queue_capacity, 32);
        assert_eq!(hub_config.send_timeout, Duration::from_millis(250));
        assert!(!state.hub.is_stopped());
    }
}
