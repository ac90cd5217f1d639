//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and drives one session per
//! connection: a writer task draining the outbound queue and a reader task
//! processing inbound messages.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::connection::{CloseReason, OutboundQueue};
use super::hub::BroadcastHub;
use super::messages::{ClientMessage, ServerMessage};
use super::registry::Filter;
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle an established WebSocket connection
pub async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (mut sender, mut receiver) = socket.split();
    let manager = Arc::clone(hub.connections());
    let send_timeout = hub.config().send_timeout;

    let (connection_id, queue) = match manager.accept().await {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected WebSocket connection");
            if let Ok(payload) = (ServerMessage::Error {
                message: e.to_string(),
            })
            .encode()
            {
                let _ = tokio::time::timeout(
                    send_timeout,
                    sender.send(Message::Text(payload.to_string())),
                )
                .await;
            }
            let _ = tokio::time::timeout(send_timeout, sender.close()).await;
            return;
        }
    };

    if let Err(e) = manager.open(&connection_id).await {
        tracing::error!(connection_id = %connection_id, error = %e, "Failed to open connection");
        manager.finish(&connection_id, CloseReason::WriteFailed).await;
        return;
    }

    let conn_id_for_send = connection_id.clone();

    // Task to forward queued payloads to the WebSocket
    let mut send_task =
        tokio::spawn(async move { write_loop(sender, queue, send_timeout, &conn_id_for_send).await });

    let hub_for_recv = Arc::clone(&hub);
    let conn_id_for_recv = connection_id.clone();

    // Task to receive messages from the WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    let reason = tokio::select! {
        result = &mut send_task => {
            recv_task.abort();
            result.unwrap_or(CloseReason::WriteFailed)
        }
        _ = &mut recv_task => {
            send_task.abort();
            CloseReason::ClientClosed
        }
    };

    manager.finish(&connection_id, reason).await;
}

/// Drain the outbound queue into the socket
///
/// Every write is bounded by `send_timeout`. The loop ends when the
/// connection is closed by the manager (queue exhausted) or a write fails.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut queue: OutboundQueue,
    send_timeout: Duration,
    connection_id: &str,
) -> CloseReason {
    while let Some(payload) = queue.recv().await {
        match tokio::time::timeout(send_timeout, sender.send(Message::Text(payload.to_string())))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket send failed, closing connection"
                );
                return CloseReason::WriteFailed;
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "WebSocket send timed out, closing connection"
                );
                return CloseReason::SendTimeout;
            }
        }
    }

    // Queue closed by the manager: say goodbye
    let _ = tokio::time::timeout(send_timeout, sender.send(Message::Close(None))).await;
    CloseReason::Shutdown
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(hub: &Arc<BroadcastHub>, connection_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(hub, connection_id, client_msg).await;
                }
                Err(e) => {
                    // Dropped; the connection stays open
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        text = %text,
                        "Invalid client message"
                    );
                }
            }
            true
        }
        Message::Binary(data) => {
            tracing::debug!(
                connection_id = %connection_id,
                bytes = data.len(),
                "Binary message ignored"
            );
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            // Axum answers pings automatically
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
///
/// | type          | reply                    |
/// |---------------|--------------------------|
/// | `subscribe`   | `subscription_confirmed` |
/// | `unsubscribe` | `unsubscribed`           |
/// | `ping`        | `pong`                   |
/// | `get_stats`   | `streaming_stats`        |
/// | other         | none (logged)            |
async fn handle_client_message(hub: &Arc<BroadcastHub>, connection_id: &str, message: ClientMessage) {
    let reply = match message {
        ClientMessage::Subscribe { filters, .. } => {
            let filter = Filter::from_spec(&filters.unwrap_or_default());
            match hub.subscribe(connection_id, filter).await {
                Ok(effective) => ServerMessage::SubscriptionConfirmed { filters: effective },
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Subscribe error");
                    return;
                }
            }
        }
        ClientMessage::Unsubscribe => match hub.unsubscribe(connection_id).await {
            Ok(()) => ServerMessage::Unsubscribed,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Unsubscribe error");
                return;
            }
        },
        ClientMessage::Ping => ServerMessage::Pong,
        ClientMessage::GetStats => ServerMessage::StreamingStats { stats: hub.stats() },
        ClientMessage::Unknown => {
            tracing::debug!(connection_id = %connection_id, "Unknown message type ignored");
            return;
        }
    };

    if let Err(e) = hub.send_to(connection_id, &reply).await {
        tracing::debug!(connection_id = %connection_id, error = %e, "Failed to queue reply");
    }
}
