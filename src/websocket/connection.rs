//! Connection Lifecycle Manager
//!
//! Owns every live connection and its bounded outbound queue. This is the
//! only place that hands payloads to a transport writer.
//!
//! State machine per connection:
//!
//! ```text
//! connecting --open()--> open --close()--> closing --> closed
//! ```
//!
//! Leaving `open` unregisters the subscription and decrements the
//! connected-client count. A closed connection is removed from the map,
//! which drops its queue sender and lets the writer task finish.
//!
//! Lock order is always connections → registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Notify, RwLock};
use uuid::Uuid;

use super::hub::{HubConfig, HubError};
use super::messages::ServerMessage;
use super::registry::{ConnectionId, Filter, SharedRegistry};
use super::stats::Statistics;

/// Serialized message ready for the wire
pub type Payload = Arc<str>;

/// Liveness state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Why a connection was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended
    ClientClosed,
    /// Transport write returned an error
    WriteFailed,
    /// Transport write did not finish within the send timeout
    SendTimeout,
    /// Outbound queue was full (slow consumer)
    QueueOverflow,
    /// Server is shutting down
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "client closed"),
            CloseReason::WriteFailed => write!(f, "write failed"),
            CloseReason::SendTimeout => write!(f, "send timeout"),
            CloseReason::QueueOverflow => write!(f, "outbound queue overflow"),
            CloseReason::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Handle for sending messages to a specific connection
struct ConnectionHandle {
    sender: mpsc::Sender<Payload>,
    state: ConnectionState,
    queue_depth: Arc<AtomicUsize>,
    accepted_at: Instant,
}

/// Receiving half of a connection's outbound queue, drained by its writer
pub struct OutboundQueue {
    receiver: mpsc::Receiver<Payload>,
    depth: Arc<AtomicUsize>,
}

impl OutboundQueue {
    /// Next payload, or `None` once the connection has been closed and the
    /// queue drained
    pub async fn recv(&mut self) -> Option<Payload> {
        let payload = self.receiver.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(payload)
    }
}

/// Manages all WebSocket connections
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    registry: SharedRegistry,
    stats: Arc<Statistics>,
    config: HubConfig,
    shutdown_tx: watch::Sender<bool>,
    /// Sessions whose handler task has not finished yet
    live_sessions: AtomicUsize,
    drained: Notify,
}

impl ConnectionManager {
    pub fn new(registry: SharedRegistry, stats: Arc<Statistics>, config: HubConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            connections: RwLock::new(HashMap::new()),
            registry,
            stats,
            config,
            shutdown_tx,
            live_sessions: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Accept a new transport session in the `connecting` state
    ///
    /// Returns the connection id and the queue its writer should drain.
    pub async fn accept(&self) -> Result<(ConnectionId, OutboundQueue), HubError> {
        if self.is_shutting_down() {
            return Err(HubError::ShuttingDown);
        }

        let mut connections = self.connections.write().await;
        // shutdown() flips the flag before snapshotting ids, so checking
        // again under the write lock means it either sees us or we see it
        if self.is_shutting_down() {
            return Err(HubError::ShuttingDown);
        }
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::channel(self.config.outbound_queue_capacity.max(1));
        let depth = Arc::new(AtomicUsize::new(0));

        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                state: ConnectionState::Connecting,
                queue_depth: Arc::clone(&depth),
                accepted_at: Instant::now(),
            },
        );
        self.live_sessions.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(connection_id = %id, "WebSocket accepted");
        Ok((id, OutboundQueue { receiver, depth }))
    }

    /// Complete the handshake: `connecting -> open`
    ///
    /// Queues `connection_established` ahead of anything else, registers the
    /// connection with the subscription registry and counts it as connected.
    pub async fn open(&self, id: &str) -> Result<(), HubError> {
        let greeting = ServerMessage::connection_established(id).encode()?;

        let mut connections = self.connections.write().await;
        if self.is_shutting_down() {
            return Err(HubError::ShuttingDown);
        }
        let handle = connections
            .get_mut(id)
            .ok_or_else(|| HubError::ConnectionNotFound(id.to_string()))?;

        if handle.state != ConnectionState::Connecting {
            return Err(HubError::InvalidState {
                id: id.to_string(),
                state: handle.state,
            });
        }

        handle
            .sender
            .try_send(greeting)
            .map_err(|_| HubError::SendFailed)?;
        handle.queue_depth.fetch_add(1, Ordering::SeqCst);
        handle.state = ConnectionState::Open;

        let connected = self.stats.client_opened();
        self.registry.write().await.register(id);

        tracing::info!(
            connection_id = %id,
            connected_clients = connected,
            "WebSocket connected"
        );
        Ok(())
    }

    /// Enqueue a payload for one open connection without waiting
    pub async fn deliver(&self, id: &str, payload: Payload) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        let handle = connections
            .get(id)
            .ok_or_else(|| HubError::ConnectionNotFound(id.to_string()))?;
        enqueue(id, handle, payload)
    }

    /// Enqueue a payload for each listed connection
    ///
    /// Returns the ids that could not take it. One failure never stops
    /// delivery to the rest.
    pub async fn deliver_many(
        &self,
        ids: &[ConnectionId],
        payload: &Payload,
    ) -> (usize, Vec<(ConnectionId, HubError)>) {
        let connections = self.connections.read().await;
        let mut delivered = 0;
        let mut failed = Vec::new();

        for id in ids {
            let result = match connections.get(id) {
                Some(handle) => enqueue(id, handle, Arc::clone(payload)),
                None => Err(HubError::ConnectionNotFound(id.clone())),
            };
            match result {
                Ok(()) => delivered += 1,
                Err(e) => failed.push((id.clone(), e)),
            }
        }

        (delivered, failed)
    }

    /// Enqueue a payload for every open connection, regardless of filter
    pub async fn broadcast(&self, payload: &Payload) -> (usize, Vec<(ConnectionId, HubError)>) {
        let ids: Vec<ConnectionId> = {
            let connections = self.connections.read().await;
            connections
                .iter()
                .filter(|(_, handle)| handle.state == ConnectionState::Open)
                .map(|(id, _)| id.clone())
                .collect()
        };
        self.deliver_many(&ids, payload).await
    }

    /// Replace the filter of an open connection
    pub async fn apply_filter(&self, id: &str, filter: Filter) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        require_open(id, connections.get(id))?;
        self.registry.write().await.update_filter(id, filter);
        Ok(())
    }

    /// Drop the filter of an open connection
    pub async fn clear_filter(&self, id: &str) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        require_open(id, connections.get(id))?;
        self.registry.write().await.clear_filter(id);
        Ok(())
    }

    /// Tear a connection down: `open -> closing -> closed`
    ///
    /// Idempotent; closing an unknown or already closed id does nothing.
    pub async fn close(&self, id: &str, reason: CloseReason) -> bool {
        let mut connections = self.connections.write().await;
        let Some(handle) = connections.get_mut(id) else {
            return false;
        };

        let was_open = handle.state == ConnectionState::Open;
        handle.state = ConnectionState::Closing;

        self.registry.write().await.unregister(id);
        let connected = if was_open {
            self.stats.client_closed()
        } else {
            self.stats.connected_clients()
        };

        if let Some(handle) = connections.remove(id) {
            tracing::info!(
                connection_id = %id,
                reason = %reason,
                connected_clients = connected,
                pending = handle.queue_depth.load(Ordering::SeqCst),
                session_secs = handle.accepted_at.elapsed().as_secs(),
                "WebSocket disconnected"
            );
        }
        true
    }

    /// Called by the session handler once its tasks have stopped
    pub async fn finish(&self, id: &str, reason: CloseReason) {
        self.close(id, reason).await;
        let remaining = self
            .live_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0)
            .saturating_sub(1);
        if remaining == 0 {
            self.drained.notify_waiters();
        }
    }

    /// Close every connection and wait for their sessions to end
    ///
    /// Returns `false` if sessions were still running when the grace period
    /// ran out.
    pub async fn shutdown(&self) -> bool {
        self.shutdown_tx.send_replace(true);

        let ids: Vec<ConnectionId> = self.connections.read().await.keys().cloned().collect();
        for id in &ids {
            self.close(id, CloseReason::Shutdown).await;
        }

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        loop {
            let notified = self.drained.notified();
            if self.live_sessions.load(Ordering::SeqCst) == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                tracing::warn!(
                    sessions = self.live_sessions.load(Ordering::SeqCst),
                    "Shutdown grace period elapsed with sessions still running"
                );
                return false;
            }
        }
    }

    /// Receiver that flips to `true` when shutdown begins
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub async fn state(&self, id: &str) -> Option<ConnectionState> {
        self.connections.read().await.get(id).map(|h| h.state)
    }

    pub async fn queue_depth(&self, id: &str) -> Option<usize> {
        self.connections
            .read()
            .await
            .get(id)
            .map(|h| h.queue_depth.load(Ordering::SeqCst))
    }

    /// Connections in any state
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn open_count(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|h| h.state == ConnectionState::Open)
            .count()
    }
}

fn require_open(id: &str, handle: Option<&ConnectionHandle>) -> Result<(), HubError> {
    match handle {
        Some(h) if h.state == ConnectionState::Open => Ok(()),
        Some(h) => Err(HubError::InvalidState {
            id: id.to_string(),
            state: h.state,
        }),
        None => Err(HubError::ConnectionNotFound(id.to_string())),
    }
}

fn enqueue(id: &str, handle: &ConnectionHandle, payload: Payload) -> Result<(), HubError> {
    if handle.state != ConnectionState::Open {
        return Err(HubError::InvalidState {
            id: id.to_string(),
            state: handle.state,
        });
    }
    match handle.sender.try_send(payload) {
        Ok(()) => {
            handle.queue_depth.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        Err(TrySendError::Full(_)) => Err(HubError::QueueFull(id.to_string())),
        Err(TrySendError::Closed(_)) => Err(HubError::SendFailed),
    }
}
