//! Broadcast Hub
//!
//! Accepts captured errors, analyzes them, and fans the serialized
//! `flutter_error` message out to every connection whose filter matches.
//! Also owns the streaming statistics and their periodic broadcast.
//!
//! Publishing never writes to a socket. Payloads go onto each connection's
//! bounded queue with `try_send`; a connection whose queue is full or gone
//! is closed after dispatch, without affecting anyone else.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::connection::{CloseReason, ConnectionManager, ConnectionState, Payload};
use super::messages::{FilterSpec, ServerMessage};
use super::registry::{ConnectionId, Filter, SharedRegistry, SubscriptionRegistry};
use super::stats::{ErrorSummary, Statistics, StatsSnapshot};
use crate::analyzer::analyze;
use crate::config::StreamingConfig;
use crate::event::{AnalyzedEvent, CaptureError, ErrorEvent, RawError};

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Capacity of each connection's outbound queue
    pub outbound_queue_capacity: usize,
    /// Longest a single transport write may take
    pub send_timeout: Duration,
    /// Interval between `streaming_stats` broadcasts
    pub stats_interval: Duration,
    /// How long shutdown waits for sessions to close
    pub shutdown_grace: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            outbound_queue_capacity: 256,
            send_timeout: Duration::from_secs(5),
            stats_interval: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl From<&StreamingConfig> for HubConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            outbound_queue_capacity: config.outbound_queue_capacity,
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            stats_interval: Duration::from_secs(config.stats_interval_secs.max(1)),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
        }
    }
}

/// Fan-out engine for captured errors
pub struct BroadcastHub {
    registry: SharedRegistry,
    stats: Arc<Statistics>,
    connections: Arc<ConnectionManager>,
    config: HubConfig,
}

impl BroadcastHub {
    /// Create a new broadcast hub
    pub fn new(config: HubConfig) -> Self {
        let registry = SubscriptionRegistry::shared();
        let stats = Arc::new(Statistics::new());
        let connections = Arc::new(ConnectionManager::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            config.clone(),
        ));

        Self {
            registry,
            stats,
            connections,
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Validate a raw error and publish it
    ///
    /// This is the producer ingress: nothing enters the pipeline except
    /// through here or [`publish`](Self::publish).
    pub async fn capture(&self, raw: RawError) -> Result<AnalyzedEvent, CaptureError> {
        let event = ErrorEvent::capture(raw).map_err(|e| {
            tracing::debug!(error = %e, "Rejected capture");
            e
        })?;
        Ok(self.publish(event).await)
    }

    /// Count, analyze, and dispatch an event to matching subscribers
    ///
    /// Events from a single caller reach each subscriber in call order.
    /// Subscribers registered after dispatch never see the event.
    pub async fn publish(&self, event: ErrorEvent) -> AnalyzedEvent {
        let total = self.stats.record_error(&event).await;
        let analyzed = analyze(event);

        let payload = match ServerMessage::from(&analyzed).encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error_id = %analyzed.id(), error = %e, "Failed to serialize event");
                return analyzed;
            }
        };

        let targets = self.registry.read().await.matching_ids(analyzed.event());
        let delivered = self.dispatch(&targets, &payload).await;

        tracing::debug!(
            error_id = %analyzed.id(),
            error_type = %analyzed.event().error_type(),
            urgency = %analyzed.urgency(),
            subscribers = delivered,
            total_errors = total,
            "Published error event"
        );

        analyzed
    }

    /// Install or replace a connection's filter. Returns the effective filter.
    pub async fn subscribe(&self, id: &str, filter: Filter) -> Result<FilterSpec, HubError> {
        let effective = filter.to_spec();
        self.connections.apply_filter(id, filter).await?;

        tracing::debug!(
            connection_id = %id,
            error_types = ?effective.error_types,
            severity_levels = ?effective.severity_levels,
            "Subscribed"
        );
        Ok(effective)
    }

    /// Remove a connection's filter
    pub async fn unsubscribe(&self, id: &str) -> Result<(), HubError> {
        self.connections.clear_filter(id).await?;
        tracing::debug!(connection_id = %id, "Unsubscribed");
        Ok(())
    }

    /// Send a message directly to a specific connection
    ///
    /// A connection that cannot take the message is closed.
    pub async fn send_to(&self, id: &str, message: &ServerMessage) -> Result<(), HubError> {
        let payload = message.encode()?;
        match self.connections.deliver(id, payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.connections.close(id, close_reason(&e)).await;
                Err(e)
            }
        }
    }

    /// Broadcast a statistics snapshot to every open connection
    pub async fn broadcast_stats(&self) -> usize {
        let message = ServerMessage::StreamingStats {
            stats: self.stats(),
        };
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize statistics");
                return 0;
            }
        };

        let (delivered, failed) = self.connections.broadcast(&payload).await;
        self.close_failed(failed).await;

        tracing::trace!(subscribers = delivered, "Broadcast statistics");
        delivered
    }

    /// Spawn the periodic statistics broadcast
    ///
    /// The task stops when the hub shuts down.
    pub fn start_stats_broadcast(self: Arc<Self>) -> JoinHandle<()> {
        let mut shutdown = self.connections.shutdown_signal();

        tracing::info!(
            interval_ms = self.config.stats_interval.as_millis() as u64,
            "Starting statistics broadcast"
        );

        tokio::spawn(async move {
            let already_stopped = *shutdown.borrow();
            if already_stopped {
                return;
            }

            let mut ticker = tokio::time::interval(self.config.stats_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.broadcast_stats().await;
                    }
                    // Only ever flips to true
                    _ = shutdown.changed() => {
                        tracing::debug!("Statistics broadcast stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Captured error counts by type and severity
    pub async fn summary(&self) -> ErrorSummary {
        self.stats.summary().await
    }

    /// Stop accepting connections, close every open one, stop the timer
    pub async fn shutdown(&self) {
        tracing::info!(
            connected_clients = self.stats.connected_clients(),
            "Shutting down broadcast hub"
        );
        self.stats.mark_stopped();
        let drained = self.connections.shutdown().await;
        tracing::info!(drained, "Broadcast hub stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.connections.is_shutting_down()
    }

    /// Number of connections currently tracked by the registry
    pub async fn subscriber_count(&self) -> usize {
        self.registry.read().await.len()
    }

    async fn dispatch(&self, targets: &[ConnectionId], payload: &Payload) -> usize {
        if targets.is_empty() {
            return 0;
        }
        let (delivered, failed) = self.connections.deliver_many(targets, payload).await;
        self.close_failed(failed).await;
        delivered
    }

    async fn close_failed(&self, failed: Vec<(ConnectionId, HubError)>) {
        for (id, error) in failed {
            tracing::warn!(connection_id = %id, error = %error, "Delivery failed, closing connection");
            self.connections.close(&id, close_reason(&error)).await;
        }
    }
}

fn close_reason(error: &HubError) -> CloseReason {
    match error {
        HubError::QueueFull(_) => CloseReason::QueueOverflow,
        HubError::ShuttingDown => CloseReason::Shutdown,
        _ => CloseReason::WriteFailed,
    }
}

/// Errors that can occur in the broadcast hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Connection {id} is {state}")]
    InvalidState { id: String, state: ConnectionState },

    #[error("Outbound queue full for connection {0}")]
    QueueFull(String),

    #[error("Failed to send message")]
    SendFailed,

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;
    use crate::websocket::connection::OutboundQueue;
    use crate::websocket::stats::ServerStatus;

    async fn connect(hub: &BroadcastHub) -> (ConnectionId, OutboundQueue) {
        let (id, mut queue) = hub.connections().accept().await.unwrap();
        hub.connections().open(&id).await.unwrap();
        let greeting = queue.recv().await.unwrap();
        assert!(greeting.contains("connection_established"));
        (id, queue)
    }

    fn raw(error_type: &str, severity: Severity) -> RawError {
        RawError::new(error_type, "something broke").severity(severity)
    }

    fn parse(payload: &str) -> serde_json::Value {
        serde_json::from_str(payload).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.outbound_queue_capacity, 256);
        assert_eq!(config.stats_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_total_errors_counts_every_publish() {
        let hub = BroadcastHub::new(HubConfig::default());
        for i in 0..7 {
            hub.capture(raw(&format!("type_{}", i), Severity::Info))
                .await
                .unwrap();
        }
        assert_eq!(hub.stats().total_errors, 7);
        assert_eq!(hub.stats().connected_clients, 0);
    }

    #[tokio::test]
    async fn test_capture_rejects_invalid_payload() {
        let hub = BroadcastHub::new(HubConfig::default());
        let result = hub.capture(RawError::default()).await;
        assert!(matches!(result, Err(CaptureError::MissingField(_))));
        assert_eq!(hub.stats().total_errors, 0);
    }

    #[tokio::test]
    async fn test_publish_delivers_in_order_to_matching_subscriber() {
        let hub = BroadcastHub::new(HubConfig::default());
        let (id, mut queue) = connect(&hub).await;
        hub.subscribe(&id, Filter::all()).await.unwrap();

        let mut expected = Vec::new();
        for _ in 0..20 {
            let analyzed = hub.capture(raw("ui", Severity::Error)).await.unwrap();
            expected.push(analyzed.id().to_string());
        }

        for expected_id in expected {
            let msg = parse(&queue.recv().await.unwrap());
            assert_eq!(msg["type"], "flutter_error");
            assert_eq!(msg["event"]["id"], expected_id.as_str());
        }
    }

    #[tokio::test]
    async fn test_non_matching_events_are_not_delivered() {
        let hub = BroadcastHub::new(HubConfig::default());
        let (id, mut queue) = connect(&hub).await;
        let filter = Filter::from_spec(&FilterSpec {
            error_types: vec!["network".to_string()],
            severity_levels: vec!["all".to_string()],
        });
        hub.subscribe(&id, filter).await.unwrap();

        hub.capture(raw("ui", Severity::Fatal)).await.unwrap();
        hub.capture(raw("network", Severity::Info)).await.unwrap();

        let msg = parse(&queue.recv().await.unwrap());
        assert_eq!(msg["event"]["error"]["errorType"], "network");
        assert_eq!(hub.connections().queue_depth(&id).await, Some(0));
    }

    #[tokio::test]
    async fn test_no_events_before_subscribe() {
        let hub = BroadcastHub::new(HubConfig::default());
        let (id, _queue) = connect(&hub).await;

        hub.capture(raw("ui", Severity::Error)).await.unwrap();
        assert_eq!(hub.connections().queue_depth(&id).await, Some(0));
    }

    #[tokio::test]
    async fn test_failed_connection_is_isolated_and_closed() {
        let hub = BroadcastHub::new(HubConfig::default());
        let (alive, mut alive_queue) = connect(&hub).await;
        let (dead, dead_queue) = connect(&hub).await;
        hub.subscribe(&alive, Filter::all()).await.unwrap();
        hub.subscribe(&dead, Filter::all()).await.unwrap();
        drop(dead_queue);

        let analyzed = hub.capture(raw("overflow", Severity::Error)).await.unwrap();

        let msg = parse(&alive_queue.recv().await.unwrap());
        assert_eq!(msg["event"]["id"], analyzed.id());
        assert_eq!(hub.connections().state(&dead).await, None);
        assert_eq!(hub.stats().connected_clients, 1);
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped() {
        let hub = BroadcastHub::new(HubConfig {
            outbound_queue_capacity: 4,
            ..HubConfig::default()
        });
        let (slow, _slow_queue) = connect(&hub).await;
        let (fast, mut fast_queue) = connect(&hub).await;
        hub.subscribe(&slow, Filter::all()).await.unwrap();
        hub.subscribe(&fast, Filter::all()).await.unwrap();

        for _ in 0..6 {
            hub.capture(raw("ui", Severity::Error)).await.unwrap();
            fast_queue.recv().await.unwrap();
        }

        assert_eq!(hub.connections().state(&slow).await, None);
        assert_eq!(hub.connections().state(&fast).await, Some(ConnectionState::Open));
    }

    #[tokio::test]
    async fn test_stats_broadcast_ignores_filters() {
        let hub = BroadcastHub::new(HubConfig::default());
        let (a, mut queue_a) = connect(&hub).await;
        let (_b, mut queue_b) = connect(&hub).await;
        let filter = Filter::from_spec(&FilterSpec {
            error_types: vec![],
            severity_levels: vec![],
        });
        hub.subscribe(&a, filter).await.unwrap();

        assert_eq!(hub.broadcast_stats().await, 2);

        for queue in [&mut queue_a, &mut queue_b] {
            let msg = parse(&queue.recv().await.unwrap());
            assert_eq!(msg["type"], "streaming_stats");
            assert_eq!(msg["stats"]["connectedClients"], 2);
            assert_eq!(msg["stats"]["serverStatus"], "streaming");
        }
    }

    #[tokio::test]
    async fn test_subscribe_unknown_connection() {
        let hub = BroadcastHub::new(HubConfig::default());
        assert!(matches!(
            hub.subscribe("ghost", Filter::all()).await,
            Err(HubError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_groups_counts() {
        let hub = BroadcastHub::new(HubConfig::default());
        hub.capture(raw("overflow", Severity::Error)).await.unwrap();
        hub.capture(raw("overflow", Severity::Fatal)).await.unwrap();
        hub.capture(raw("network", Severity::Error)).await.unwrap();

        let summary = hub.summary().await;
        assert_eq!(summary.total_errors, 3);
        assert_eq!(summary.by_type["overflow"], 2);
        assert_eq!(summary.by_severity["error"], 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            stats_interval: Duration::from_millis(20),
            shutdown_grace: Duration::from_millis(100),
            ..HubConfig::default()
        }));
        let timer = Arc::clone(&hub).start_stats_broadcast();

        hub.shutdown().await;
        timer.await.unwrap();

        assert!(hub.is_stopped());
        assert_eq!(hub.stats().server_status, ServerStatus::Stopped);
        assert!(matches!(
            hub.connections().accept().await,
            Err(HubError::ShuttingDown)
        ));
    }
}
