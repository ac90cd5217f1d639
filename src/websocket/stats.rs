//! Streaming statistics
//!
//! Counters are atomics so snapshots never wait on the connection map.
//! Per-type and per-severity pattern counts sit behind their own lock.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::event::ErrorEvent;

/// Distinct error types counted individually in the summary
///
/// Error types are client supplied, so once this many are tracked any new
/// type is counted under [`OTHER_TYPES_KEY`].
pub const MAX_TRACKED_TYPES: usize = 256;

/// Summary bucket for error types past [`MAX_TRACKED_TYPES`]
pub const OTHER_TYPES_KEY: &str = "other";

/// Overall server status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Running with no open connections
    Idle,
    /// At least one connection is open
    Streaming,
    /// Shut down
    Stopped,
}

/// Read-only view broadcast as `streaming_stats`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_errors: u64,
    pub connected_clients: usize,
    pub server_status: ServerStatus,
}

/// Captured error counts grouped by type and severity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub total_errors: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_severity: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct PatternCounts {
    by_type: BTreeMap<String, u64>,
    by_severity: BTreeMap<String, u64>,
}

/// Process-lifetime streaming statistics
#[derive(Debug, Default)]
pub struct Statistics {
    total_errors: AtomicU64,
    connected_clients: AtomicUsize,
    stopped: AtomicBool,
    patterns: RwLock<PatternCounts>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a captured error. Returns the new total.
    pub async fn record_error(&self, event: &ErrorEvent) -> u64 {
        let total = self.total_errors.fetch_add(1, Ordering::SeqCst) + 1;

        let mut patterns = self.patterns.write().await;
        let error_type = event.error_type();
        let key = if patterns.by_type.contains_key(error_type)
            || patterns.by_type.len() < MAX_TRACKED_TYPES
        {
            error_type
        } else {
            OTHER_TYPES_KEY
        };
        *patterns.by_type.entry(key.to_string()).or_insert(0) += 1;
        *patterns
            .by_severity
            .entry(event.severity().to_string())
            .or_insert(0) += 1;

        total
    }

    /// A connection entered the `open` state
    pub fn client_opened(&self) -> usize {
        self.connected_clients.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A connection left the `open` state
    pub fn client_closed(&self) -> usize {
        // Never wraps below zero even if open/close bookkeeping drifts.
        let previous = self
            .connected_clients
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::SeqCst)
    }

    pub fn connected_clients(&self) -> usize {
        self.connected_clients.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ServerStatus {
        if self.stopped.load(Ordering::SeqCst) {
            ServerStatus::Stopped
        } else if self.connected_clients() > 0 {
            ServerStatus::Streaming
        } else {
            ServerStatus::Idle
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_errors: self.total_errors(),
            connected_clients: self.connected_clients(),
            server_status: self.status(),
        }
    }

    pub async fn summary(&self) -> ErrorSummary {
        let patterns = self.patterns.read().await;
        ErrorSummary {
            total_errors: self.total_errors(),
            by_type: patterns.by_type.clone(),
            by_severity: patterns.by_severity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RawError, Severity};

    #[tokio::test]
    async fn test_record_error_counts() {
        let stats = Statistics::new();
        let overflow = ErrorEvent::new("overflow", "too wide").unwrap();
        let fatal = ErrorEvent::capture(RawError::new("ui", "gone").severity(Severity::Fatal))
            .unwrap();

        assert_eq!(stats.record_error(&overflow).await, 1);
        assert_eq!(stats.record_error(&overflow).await, 2);
        assert_eq!(stats.record_error(&fatal).await, 3);

        let summary = stats.summary().await;
        assert_eq!(summary.total_errors, 3);
        assert_eq!(summary.by_type["overflow"], 2);
        assert_eq!(summary.by_type["ui"], 1);
        assert_eq!(summary.by_severity["error"], 2);
        assert_eq!(summary.by_severity["fatal"], 1);
    }

    #[tokio::test]
    async fn test_type_counts_are_bounded() {
        let stats = Statistics::new();
        for i in 0..MAX_TRACKED_TYPES + 40 {
            let event = ErrorEvent::new(format!("custom_{}", i), "boom").unwrap();
            stats.record_error(&event).await;
        }
        // Already tracked types keep their own bucket
        let known = ErrorEvent::new("custom_0", "again").unwrap();
        stats.record_error(&known).await;

        let summary = stats.summary().await;
        assert_eq!(summary.total_errors, (MAX_TRACKED_TYPES + 41) as u64);
        assert!(summary.by_type.len() <= MAX_TRACKED_TYPES + 1);
        assert_eq!(summary.by_type["custom_0"], 2);
        assert_eq!(summary.by_type[OTHER_TYPES_KEY], 40);
        assert!(!summary.by_type.contains_key(&format!("custom_{}", MAX_TRACKED_TYPES)));
        assert_eq!(summary.by_type.values().sum::<u64>(), summary.total_errors);
    }

    #[test]
    fn test_status_transitions() {
        let stats = Statistics::new();
        assert_eq!(stats.status(), ServerStatus::Idle);

        stats.client_opened();
        assert_eq!(stats.status(), ServerStatus::Streaming);

        stats.client_closed();
        assert_eq!(stats.status(), ServerStatus::Idle);

        stats.mark_stopped();
        assert_eq!(stats.snapshot().server_status, ServerStatus::Stopped);
    }

    #[test]
    fn test_client_closed_saturates() {
        let stats = Statistics::new();
        assert_eq!(stats.client_closed(), 0);
        assert_eq!(stats.connected_clients(), 0);
    }
}
