//! Heartbeat event model: the wire-level value submitted to the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single activity heartbeat.
///
/// Immutable once constructed. The server may merge consecutive events whose
/// `data` matches within the pulse-time window; client-side coalescing
/// ([`crate::coalesce`]) compares `data` only — timestamp and duration are
/// excluded from equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    timestamp: DateTime<Utc>,
    duration: f64,
    data: Map<String, Value>,
}

impl HeartbeatEvent {
    /// Create an event stamped with the current wall-clock time.
    ///
    /// Negative durations are clamped to zero.
    pub fn new(duration: f64, data: Map<String, Value>) -> Self {
        Self::with_timestamp(Utc::now(), duration, data)
    }

    /// Create an event with an explicit timestamp (signal-supplied).
    pub fn with_timestamp(timestamp: DateTime<Utc>, duration: f64, data: Map<String, Value>) -> Self {
        Self {
            timestamp,
            duration: duration.max(0.0),
            data,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Coalescing equality: field-by-field over `data` only, key-order
    /// insensitive.
    pub fn same_data(&self, other: &Self) -> bool {
        self.data == other.data
    }

    /// String field accessor for `data` entries (`file`, `branch`, ...).
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

// ─── Tests ────────────────────────────────────────────────────────
