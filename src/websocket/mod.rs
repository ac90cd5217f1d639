//! WebSocket Real-Time Error Streaming
//!
//! Pushes captured errors to live subscribers over WebSocket.
//!
//! ## Architecture
//!
//! - **BroadcastHub**: Counts, analyzes and fans out published errors
//! - **SubscriptionRegistry**: Connection id → filter
//! - **ConnectionManager**: Connection lifecycle and per-connection queues
//! - **Handler**: WebSocket upgrade plus the per-session read/write loops
//! - **Messages**: Client and server message formats
//!
//! ## Protocol
//!
//! Clients connect to `/` or `/ws`, receive `connection_established`, then
//! send a `subscribe` message:
//!
//! ```json
//! {"type": "subscribe", "filters": {"errorTypes": ["all"], "severityLevels": ["error", "fatal"]}}
//! ```
//!
//! Matching errors arrive as `flutter_error` messages; every open
//! connection also receives periodic `streaming_stats`.
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({
//!     type: 'subscribe',
//!     filters: {errorTypes: ['all'], severityLevels: ['all']},
//!   }));
//! };
//!
//! ws.onmessage = (event) => console.log(JSON.parse(event.data));
//! ```

mod connection;
mod handler;
mod hub;
mod messages;
mod registry;
mod stats;

pub use connection::{CloseReason, ConnectionManager, ConnectionState, OutboundQueue, Payload};
pub use handler::{handle_socket, websocket_handler};
pub use hub::{BroadcastHub, HubConfig, HubError};
pub use messages::{
    ClientMessage, ErrorPayload, EventPayload, FilterSpec, ServerMessage, WILDCARD,
};
pub use registry::{ConnectionId, Filter, Selector, SharedRegistry, SubscriptionRegistry};
pub use stats::{ErrorSummary, ServerStatus, Statistics, StatsSnapshot};
