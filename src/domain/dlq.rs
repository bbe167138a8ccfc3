//! Dead-letter queue records and retry policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::EventMetadata;

/// How the next retry time is computed from the failure count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryPolicy {
    /// Retry as soon as a processor picks the entry up
    Immediate,

    /// Wait the base delay between every attempt
    FixedDelay,

    /// Delay grows linearly with the attempt count
    LinearBackoff,

    /// Delay doubles with every attempt
    ExponentialBackoff,
}

/// A failed event parked in the dead-letter queue.
///
/// Created on first failure. `retry_count` and `next_retry_at` are updated
/// on every failed attempt; once `retry_count` reaches `max_retries` the
/// entry leaves the retry index but the record itself is kept as a permanent
/// failure marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Id of the original event
    pub event_id: String,

    /// Type of the original event
    pub event_type: String,

    /// Original event payload, replayed into the processor on retry
    pub payload: serde_json::Value,

    /// Metadata the event carried when it failed
    pub metadata: EventMetadata,

    /// Why the original processing failed
    pub failure_reason: String,

    /// When the original processing failed
    pub failure_timestamp: DateTime<Utc>,

    /// Failed retry attempts so far
    pub retry_count: u32,

    /// Attempts after which the entry becomes a permanent failure
    pub max_retries: u32,

    /// Policy used to schedule the next attempt
    pub retry_policy: RetryPolicy,

    /// Earliest time the next attempt may run
    pub next_retry_at: DateTime<Utc>,

    /// When the entry was added to the queue
    pub dlq_timestamp: DateTime<Utc>,
}

impl DlqEntry {
    /// Whether the entry has used up all its retry attempts.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::EventPriority;

    fn sample_entry(retry_count: u32, max_retries: u32) -> DlqEntry {
        DlqEntry {
            event_id: "evt-1".to_string(),
            event_type: "document.ingested".to_string(),
            payload: serde_json::json!({"doc": "abc"}),
            metadata: EventMetadata {
                sequence_id: "ingest:1:1".to_string(),
                timestamp: Utc::now(),
                priority: EventPriority::Normal,
                correlation_id: "corr-1".to_string(),
                source_service: "ingest".to_string(),
                retry_count,
                max_retries,
            },
            failure_reason: "downstream timeout".to_string(),
            failure_timestamp: Utc::now(),
            retry_count,
            max_retries,
            retry_policy: RetryPolicy::ExponentialBackoff,
            next_retry_at: Utc::now(),
            dlq_timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_exhaustion() {
        assert!(!sample_entry(2, 3).is_exhausted());
        assert!(sample_entry(3, 3).is_exhausted());
    }

    #[test]
    fn test_policy_serializes_as_string() {
        let json = serde_json::to_string(&RetryPolicy::ExponentialBackoff).unwrap();
        assert_eq!(json, "\"EXPONENTIAL_BACKOFF\"");

        let parsed: RetryPolicy = serde_json::from_str("\"FIXED_DELAY\"").unwrap();
        assert_eq!(parsed, RetryPolicy::FixedDelay);
    }

    #[test]
    fn test_entry_round_trip() {
        let entry = sample_entry(1, 3);
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: DlqEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.event_id, "evt-1");
        assert_eq!(parsed.retry_policy, RetryPolicy::ExponentialBackoff);
        assert_eq!(parsed.retry_count, 1);
    }
}
