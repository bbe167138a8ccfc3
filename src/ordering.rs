//! Event ordering and duplicate detection.
//!
//! Sequence ids are strictly increasing within one process only; consumers
//! needing a cross-process order must combine timestamp, sequence id and
//! service name as a best-effort tiebreak. The seen-event cache is a local
//! optimization for at-least-once delivery, never authoritative: a replica
//! restart forgets the window, and that is acceptable.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::DedupConfig;
use crate::domain::{EventMetadata, EventPriority};

/// Stamps outgoing events and flags recently-seen incoming event ids.
pub struct EventOrderer {
    service_name: String,
    default_max_retries: u32,
    counter: AtomicU64,
    cache: Mutex<SeenCache>,
}

impl EventOrderer {
    /// `default_max_retries` is stamped into every event's metadata and is
    /// what the dead-letter queue enforces; pass the owning service's
    /// `DlqConfig::default_max_retries` here.
    pub fn new(service_name: &str, config: DedupConfig, default_max_retries: u32) -> Self {
        Self {
            service_name: service_name.to_string(),
            default_max_retries,
            counter: AtomicU64::new(0),
            cache: Mutex::new(SeenCache::new(config.capacity, config.ttl())),
        }
    }

    /// Stamp metadata for an outgoing event.
    ///
    /// The sequence id has the form `service:millis:counter` and increases
    /// monotonically for the lifetime of this process.
    pub fn create_event_metadata(
        &self,
        priority: EventPriority,
        correlation_id: &str,
    ) -> EventMetadata {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();

        EventMetadata {
            sequence_id: format!(
                "{}:{}:{}",
                self.service_name,
                now.timestamp_millis(),
                counter
            ),
            timestamp: now,
            priority,
            correlation_id: correlation_id.to_string(),
            source_service: self.service_name.clone(),
            retry_count: 0,
            max_retries: self.default_max_retries,
        }
    }

    /// Whether this event id was already seen within the dedup window.
    ///
    /// First sighting records the id and returns false; any sighting within
    /// the TTL afterwards returns true. Expired and over-capacity entries
    /// are evicted on the way in.
    pub fn is_duplicate(&self, event_id: &str) -> bool {
        // The cache is advisory, so a poisoned guard is safe to recover
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.check_and_insert(event_id)
    }

    /// Ids currently tracked in the dedup window.
    pub fn seen_count(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// Fixed-capacity seen-id cache with TTL eviction.
///
/// Entries are keyed by first-seen time, so insertion order equals expiry
/// order and a single deque drives both TTL and capacity eviction.
struct SeenCache {
    capacity: usize,
    ttl: Duration,
    first_seen: HashMap<String, Instant>,
    order: VecDeque<String>,
}

impl SeenCache {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            first_seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn check_and_insert(&mut self, event_id: &str) -> bool {
        let now = Instant::now();
        self.evict(now);

        if self.first_seen.contains_key(event_id) {
            return true;
        }

        self.first_seen.insert(event_id.to_string(), now);
        self.order.push_back(event_id.to_string());
        false
    }

    fn evict(&mut self, now: Instant) {
        // Expired entries first, then oldest entries down to capacity
        while let Some(front) = self.order.front() {
            let expired = self
                .first_seen
                .get(front)
                .map(|seen| now.duration_since(*seen) >= self.ttl)
                .unwrap_or(true);

            if expired || self.order.len() >= self.capacity {
                let id = self.order.pop_front().expect("front checked above");
                self.first_seen.remove(&id);
            } else {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.first_seen.len()
    }
}
