//! Dead-letter queue over the durable store.
//!
//! Failed events land in two structures: an entry map
//! (`dlq:failed_events`) holding the full record, and a retry index
//! (`dlq:retry_queue`) scored by next-retry time. The index only ever holds
//! entries that still have attempts left; exhausted records stay in the map
//! as permanent failure markers until an operator requeues or archives them.

mod processor;

pub use processor::{DlqProcessor, ProcessorFn};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DlqConfig;
use crate::domain::{DlqEntry, EventMetadata, RetryPolicy};
use crate::store::{DurableStore, StoreError, DLQ_ENTRIES_KEY, DLQ_RETRY_INDEX_KEY};

/// Errors surfaced by dead-letter operations.
///
/// Processor failures are not errors here; they are caught and recorded.
/// Only store trouble and corrupt records propagate.
#[derive(Debug, Error)]
pub enum DlqError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("corrupt dead-letter record for {event_id}: {source}")]
    CorruptRecord {
        event_id: String,
        source: serde_json::Error,
    },

    #[error("failed to serialize dead-letter record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable holding area for failed events.
pub struct DeadLetterQueue {
    store: Arc<dyn DurableStore>,
    config: DlqConfig,
}

impl DeadLetterQueue {
    pub fn new(store: Arc<dyn DurableStore>, config: DlqConfig) -> Self {
        Self { store, config }
    }

    /// Record a failed event and, if it has attempts left, schedule it.
    pub async fn add_failed_event(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
        metadata: EventMetadata,
        failure_reason: &str,
        retry_policy: RetryPolicy,
    ) -> Result<(), DlqError> {
        let now = Utc::now();
        let max_retries = metadata.max_retries;

        let entry = DlqEntry {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            metadata,
            failure_reason: failure_reason.to_string(),
            failure_timestamp: now,
            retry_count: 0,
            max_retries,
            retry_policy,
            next_retry_at: now + self.next_retry_delay(0, retry_policy),
            dlq_timestamp: now,
        };

        self.store
            .hash_set(DLQ_ENTRIES_KEY, event_id, &serde_json::to_string(&entry)?)
            .await?;

        if !entry.is_exhausted() {
            self.store
                .sorted_set_add(
                    DLQ_RETRY_INDEX_KEY,
                    event_id,
                    entry.next_retry_at.timestamp_millis(),
                )
                .await?;
        }

        warn!(
            event_id,
            event_type,
            policy = ?retry_policy,
            reason = failure_reason,
            "event added to dead-letter queue"
        );

        Ok(())
    }

    /// Delay before attempt `retry_count + 1` under `policy`.
    ///
    /// Non-decreasing in the retry count and capped at the configured
    /// maximum for every policy.
    pub fn next_retry_delay(&self, retry_count: u32, policy: RetryPolicy) -> chrono::Duration {
        let base = self.config.base_delay();
        let max = self.config.max_delay();

        let delay = match policy {
            RetryPolicy::Immediate => Duration::ZERO,
            RetryPolicy::FixedDelay => base,
            RetryPolicy::LinearBackoff => {
                base.saturating_mul(retry_count.saturating_add(1))
            }
            RetryPolicy::ExponentialBackoff => {
                // 2^n with the shift clamped so large counts saturate at max
                let factor = 1u32.checked_shl(retry_count.min(31)).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
        };

        chrono::Duration::from_std(delay.min(max))
            .unwrap_or_else(|_| chrono::Duration::max_value())
    }

    /// Entries due for retry, ascending by scheduled time, at most `limit`.
    pub async fn get_retryable_events(&self, limit: usize) -> Result<Vec<DlqEntry>, DlqError> {
        let now = Utc::now().timestamp_millis();
        let due = self
            .store
            .sorted_set_range_to(DLQ_RETRY_INDEX_KEY, now, limit)
            .await?;

        let mut entries = Vec::with_capacity(due.len());
        for event_id in due {
            match self.get_entry(&event_id).await? {
                Some(entry) => entries.push(entry),
                None => {
                    // Crash between index and map writes; nothing to retry
                    debug!(event_id, "dangling retry-index member, skipping");
                }
            }
        }

        Ok(entries)
    }

    /// Load a dead-letter record by event id.
    pub async fn get_entry(&self, event_id: &str) -> Result<Option<DlqEntry>, DlqError> {
        let raw = self.store.hash_get(DLQ_ENTRIES_KEY, event_id).await?;
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|source| DlqError::CorruptRecord {
                event_id: event_id.to_string(),
                source,
            })
        })
        .transpose()
    }

    /// Re-run the original operation for a parked event.
    ///
    /// Returns `Ok(true)` when the processor succeeds and the entry is
    /// removed from both structures, `Ok(false)` otherwise: missing record
    /// (idempotent no-op), processor failure, or exhaustion. Processor
    /// errors are recorded on the entry, never propagated.
    pub async fn retry_event<F, Fut>(
        &self,
        event_id: &str,
        processor: F,
    ) -> Result<bool, DlqError>
    where
        F: FnOnce(serde_json::Value) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let Some(mut entry) = self.get_entry(event_id).await? else {
            debug!(event_id, "retry requested for unknown or removed entry");
            return Ok(false);
        };

        match processor(entry.payload.clone()).await {
            Ok(()) => {
                self.store.hash_delete(DLQ_ENTRIES_KEY, event_id).await?;
                self.store
                    .sorted_set_remove(DLQ_RETRY_INDEX_KEY, event_id)
                    .await?;
                info!(
                    event_id,
                    attempts = entry.retry_count + 1,
                    "dead-letter retry succeeded"
                );
                Ok(true)
            }
            Err(err) => {
                entry.retry_count += 1;
                entry.metadata.retry_count = entry.retry_count;
                entry.failure_reason = err.to_string();
                entry.failure_timestamp = Utc::now();
                // The record always carries the schedule the policy computed,
                // even once it drops out of the automatic retry index
                entry.next_retry_at =
                    Utc::now() + self.next_retry_delay(entry.retry_count, entry.retry_policy);

                self.store
                    .hash_set(
                        DLQ_ENTRIES_KEY,
                        event_id,
                        &serde_json::to_string(&entry)?,
                    )
                    .await?;

                if entry.is_exhausted() {
                    // Keep the record as a permanent failure marker
                    self.store
                        .sorted_set_remove(DLQ_RETRY_INDEX_KEY, event_id)
                        .await?;
                    warn!(
                        event_id,
                        retries = entry.retry_count,
                        "dead-letter entry exhausted, parked permanently"
                    );
                } else {
                    self.store
                        .sorted_set_add(
                            DLQ_RETRY_INDEX_KEY,
                            event_id,
                            entry.next_retry_at.timestamp_millis(),
                        )
                        .await?;
                    debug!(
                        event_id,
                        retry_count = entry.retry_count,
                        next_retry_at = %entry.next_retry_at,
                        "dead-letter retry failed, rescheduled"
                    );
                }

                Ok(false)
            }
        }
    }
}
