//! Durable store abstraction.
//!
//! The reliability subsystems are stateless coordinators: all shared state
//! lives in a store offering key→hash maps and score-ordered sets with
//! atomic single-key operations. Production deployments back this with an
//! external service; tests and local runs use [`MemoryStore`].
//!
//! No multi-key transaction spans the entry map and the retry index, so a
//! crash between two related writes can leave transient inconsistency.
//! Readers tolerate it: a map entry without an index member is simply "not
//! currently scheduled", and a dangling index member is skipped.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Map from event_id to serialized [`crate::domain::DlqEntry`]
pub const DLQ_ENTRIES_KEY: &str = "dlq:failed_events";

/// Score-ordered set mapping event_id → next_retry_at (unix millis)
pub const DLQ_RETRY_INDEX_KEY: &str = "dlq:retry_queue";

/// Map from saga_id to serialized [`crate::domain::SagaTransaction`]
pub const SAGA_TRANSACTIONS_KEY: &str = "saga:transactions";

/// Map from event_id to serialized [`crate::domain::ReplayableEvent`]
pub const PERSISTENT_EVENTS_KEY: &str = "events:persistent";

/// Errors surfaced by a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected operation on {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Key/hash and score-ordered-set primitives.
///
/// Scores are unix-epoch milliseconds. Every method is a suspension point;
/// store unavailability propagates to the caller, which applies its own
/// backoff.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Set `field` to `value` in the hash at `key`.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Get `field` from the hash at `key`.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Delete `field` from the hash at `key`; returns whether it existed.
    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, StoreError>;

    /// All values in the hash at `key`, in unspecified order.
    async fn hash_values(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Add (or re-score) `member` in the sorted set at `key`.
    async fn sorted_set_add(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError>;

    /// Remove `member` from the sorted set at `key`; returns whether it existed.
    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Members with score ≤ `max_score`, ascending by score, at most `limit`.
    async fn sorted_set_range_to(
        &self,
        key: &str,
        max_score: i64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Current score of `member` in the sorted set at `key`.
    async fn sorted_set_score(&self, key: &str, member: &str)
        -> Result<Option<i64>, StoreError>;
}
