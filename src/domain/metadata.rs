//! Event metadata stamped by the orderer on every outgoing event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery priority of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for EventPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Metadata attached to every event leaving a service.
///
/// Immutable once created except for `retry_count`, which the dead-letter
/// machinery bumps on each failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Per-process monotonic sequence id, format `service:millis:counter`
    pub sequence_id: String,

    /// When the event was stamped
    pub timestamp: DateTime<Utc>,

    /// Delivery priority
    pub priority: EventPriority,

    /// Correlation id linking related events across services
    pub correlation_id: String,

    /// Service that produced the event
    pub source_service: String,

    /// Number of processing attempts so far
    pub retry_count: u32,

    /// Maximum processing attempts before the event is parked
    pub max_retries: u32,
}
