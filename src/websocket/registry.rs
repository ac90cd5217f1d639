//! Subscription Registry
//!
//! Maps connection ids to the filter each connection installed with its
//! last `subscribe` message. The registry itself is a plain data structure;
//! callers share it behind a lock (see [`SharedRegistry`]).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::messages::{FilterSpec, WILDCARD};
use crate::event::{ErrorEvent, Severity};

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Registry shared between the hub and the connection manager
pub type SharedRegistry = Arc<RwLock<SubscriptionRegistry>>;

/// One filter dimension: everything, or an explicit set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector<T: Eq + Hash> {
    All,
    Only(HashSet<T>),
}

impl<T: Eq + Hash> Selector<T> {
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(set) => set.contains(value),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

/// A subscriber's predicate over error type and severity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    error_types: Selector<String>,
    severities: Selector<Severity>,
}

impl Filter {
    /// Accept every event
    pub fn all() -> Self {
        Self {
            error_types: Selector::All,
            severities: Selector::All,
        }
    }

    pub fn new(error_types: Selector<String>, severities: Selector<Severity>) -> Self {
        let error_types = match error_types {
            Selector::Only(set) => Selector::Only(set.iter().map(|t| t.to_lowercase()).collect()),
            all => all,
        };
        Self {
            error_types,
            severities,
        }
    }

    /// Build from the wire format
    ///
    /// `"all"` anywhere in a list wildcards that dimension. Error types are
    /// compared case-insensitively. Unknown severity names are dropped.
    pub fn from_spec(spec: &FilterSpec) -> Self {
        let error_types = if contains_wildcard(&spec.error_types) {
            Selector::All
        } else {
            Selector::Only(
                spec.error_types
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect(),
            )
        };

        let severities = if contains_wildcard(&spec.severity_levels) {
            Selector::All
        } else {
            let mut levels = HashSet::new();
            for level in &spec.severity_levels {
                match level.parse::<Severity>() {
                    Ok(severity) => {
                        levels.insert(severity);
                    }
                    Err(_) => {
                        tracing::warn!(severity = %level, "Unknown severity in filter ignored");
                    }
                }
            }
            Selector::Only(levels)
        };

        Self {
            error_types,
            severities,
        }
    }

    /// Effective filter in wire format, sorted for a stable echo
    pub fn to_spec(&self) -> FilterSpec {
        let error_types = match &self.error_types {
            Selector::All => vec![WILDCARD.to_string()],
            Selector::Only(set) => set
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        let severity_levels = match &self.severities {
            Selector::All => vec![WILDCARD.to_string()],
            Selector::Only(set) => set
                .iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
        };
        FilterSpec {
            error_types,
            severity_levels,
        }
    }

    pub fn accepts(&self, event: &ErrorEvent) -> bool {
        let type_ok = match &self.error_types {
            Selector::All => true,
            Selector::Only(set) => set.contains(&event.error_type().to_lowercase()),
        };
        type_ok && self.severities.accepts(&event.severity())
    }
}

fn contains_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim().eq_ignore_ascii_case(WILDCARD))
}

/// Connection id → current filter (`None` until the first subscribe)
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<ConnectionId, Option<Filter>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Track a connection with no filter. Re-registering resets its filter.
    pub fn register(&mut self, id: &str) {
        self.entries.insert(id.to_string(), None);
    }

    /// Replace the connection's filter, creating the entry if needed
    pub fn update_filter(&mut self, id: &str, filter: Filter) {
        self.entries.insert(id.to_string(), Some(filter));
    }

    /// Remove the filter but keep the connection registered
    pub fn clear_filter(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            *entry = None;
        }
    }

    /// Forget a connection. Unknown ids are a no-op.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn matches(&self, id: &str, event: &ErrorEvent) -> bool {
        matches!(self.entries.get(id), Some(Some(filter)) if filter.accepts(event))
    }

    pub fn filter(&self, id: &str) -> Option<&Filter> {
        self.entries.get(id).and_then(|f| f.as_ref())
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn all_connection_ids(&self) -> Vec<ConnectionId> {
        self.entries.keys().cloned().collect()
    }

    /// Ids whose filter accepts the event
    pub fn matching_ids(&self, event: &ErrorEvent) -> Vec<ConnectionId> {
        self.entries
            .iter()
            .filter(|(_, filter)| matches!(filter, Some(f) if f.accepts(event)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
