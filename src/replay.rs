//! Durable event history with filtered, time-ordered replay queries.
//!
//! Persisting is fire-and-forget from the producer's point of view; the
//! query side selects and orders event ids only, and re-dispatching to live
//! consumers is the caller's responsibility.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReplayConfig;
use crate::domain::{EventMetadata, ReplayableEvent};
use crate::store::{DurableStore, StoreError, PERSISTENT_EVENTS_KEY};

/// Errors surfaced by replay operations.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize replay record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event not found: {0}")]
    NotFound(String),

    #[error("event {0} reached its replay limit")]
    ReplayLimit(String),
}

/// Filters for a replay query. All filters are optional and conjunctive.
#[derive(Debug, Clone, Default)]
pub struct ReplayFilter {
    /// Only these event types
    pub event_types: Option<Vec<String>>,

    /// Only this correlation id
    pub correlation_id: Option<String>,

    /// Only events at or after this time
    pub start_time: Option<DateTime<Utc>>,

    /// Only events at or before this time
    pub end_time: Option<DateTime<Utc>>,

    /// Result cap, applied after filtering; config default when absent
    pub limit: Option<usize>,
}

impl ReplayFilter {
    fn matches(&self, event: &ReplayableEvent) -> bool {
        if let Some(types) = &self.event_types {
            if !types.iter().any(|t| t == &event.event_type) {
                return false;
            }
        }
        if let Some(correlation_id) = &self.correlation_id {
            if correlation_id != &event.correlation_id {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Persists events and answers replay queries over the history.
pub struct EventReplayManager {
    store: Arc<dyn DurableStore>,
    config: ReplayConfig,
}

impl EventReplayManager {
    pub fn new(store: Arc<dyn DurableStore>, config: ReplayConfig) -> Self {
        Self { store, config }
    }

    /// Durably persist an event; always returns a fresh event id.
    pub async fn persist_event(
        &self,
        event_type: &str,
        channel: &str,
        payload: serde_json::Value,
        metadata: EventMetadata,
        correlation_id: &str,
        source_service: &str,
    ) -> Result<String, ReplayError> {
        let event = ReplayableEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            channel: channel.to_string(),
            payload,
            metadata,
            timestamp: Utc::now(),
            correlation_id: correlation_id.to_string(),
            source_service: source_service.to_string(),
            replay_count: 0,
            max_replays: self.config.max_replays,
        };

        self.store
            .hash_set(
                PERSISTENT_EVENTS_KEY,
                &event.event_id,
                &serde_json::to_string(&event)?,
            )
            .await?;

        debug!(event_id = %event.event_id, event_type, channel, "event persisted");
        Ok(event.event_id)
    }

    /// Ids of persisted events matching the filter, ascending by timestamp,
    /// truncated to the filter's limit after filtering.
    pub async fn replay_events(&self, filter: &ReplayFilter) -> Result<Vec<String>, ReplayError> {
        let mut matched: Vec<ReplayableEvent> = Vec::new();

        for json in self.store.hash_values(PERSISTENT_EVENTS_KEY).await? {
            let event: ReplayableEvent = match serde_json::from_str(&json) {
                Ok(event) => event,
                Err(err) => {
                    warn!(%err, "skipping corrupt replay record");
                    continue;
                }
            };
            if filter.matches(&event) {
                matched.push(event);
            }
        }

        matched.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.metadata.sequence_id.cmp(&b.metadata.sequence_id))
        });

        let limit = filter.limit.unwrap_or(self.config.default_limit);
        matched.truncate(limit);

        Ok(matched.into_iter().map(|e| e.event_id).collect())
    }

    /// Load a persisted event by id.
    pub async fn get_event(&self, event_id: &str) -> Result<Option<ReplayableEvent>, ReplayError> {
        let raw = self.store.hash_get(PERSISTENT_EVENTS_KEY, event_id).await?;
        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    /// Count one replay of an event against its limit.
    ///
    /// Callers invoke this after re-dispatching. Refuses once the event has
    /// reached `max_replays`.
    pub async fn mark_replayed(&self, event_id: &str) -> Result<u32, ReplayError> {
        let mut event = self
            .get_event(event_id)
            .await?
            .ok_or_else(|| ReplayError::NotFound(event_id.to_string()))?;

        if event.replay_count >= event.max_replays {
            return Err(ReplayError::ReplayLimit(event_id.to_string()));
        }

        event.replay_count += 1;
        self.store
            .hash_set(
                PERSISTENT_EVENTS_KEY,
                event_id,
                &serde_json::to_string(&event)?,
            )
            .await?;

        info!(event_id, replay_count = event.replay_count, "event replayed");
        Ok(event.replay_count)
    }
}
