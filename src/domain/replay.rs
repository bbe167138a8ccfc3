//! Durable event records for replay, recovery and audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::EventMetadata;

/// A persisted copy of an event, queryable for replay.
///
/// Immutable except for `replay_count`, bumped whenever the event is
/// re-dispatched by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayableEvent {
    /// Unique id assigned at persist time
    pub event_id: String,

    /// Event type, e.g. `document.ingested`
    pub event_type: String,

    /// Channel the event was originally published on
    pub channel: String,

    /// Original payload
    pub payload: serde_json::Value,

    /// Metadata the event carried
    pub metadata: EventMetadata,

    /// When the event was persisted
    pub timestamp: DateTime<Utc>,

    /// Correlation id linking related events
    pub correlation_id: String,

    /// Service that produced the event
    pub source_service: String,

    /// Times this event has been replayed
    pub replay_count: u32,

    /// Replays allowed before the manager refuses further ones
    pub max_replays: u32,
}
