//! Dead-Letter Queue Integration Tests
//!
//! Exercises the full failure → schedule → retry → exhaustion lifecycle
//! against the in-memory store.

use std::sync::Arc;

use ballast::store::{DurableStore, MemoryStore, DLQ_RETRY_INDEX_KEY};
use ballast::{DeadLetterQueue, DlqConfig, EventMetadata, EventPriority, RetryPolicy};
use chrono::Utc;

fn metadata(max_retries: u32) -> EventMetadata {
    EventMetadata {
        sequence_id: "ingest:1700000000000:1".to_string(),
        timestamp: Utc::now(),
        priority: EventPriority::Normal,
        correlation_id: "corr-1".to_string(),
        source_service: "ingest".to_string(),
        retry_count: 0,
        max_retries,
    }
}

fn dlq_with_store(config: DlqConfig) -> (DeadLetterQueue, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let dlq = DeadLetterQueue::new(store.clone(), config);
    (dlq, store)
}

async fn add_event(dlq: &DeadLetterQueue, event_id: &str, max_retries: u32, policy: RetryPolicy) {
    dlq.add_failed_event(
        event_id,
        "document.ingested",
        serde_json::json!({"doc": event_id}),
        metadata(max_retries),
        "downstream unavailable",
        policy,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_immediate_entry_is_retryable_at_once() {
    let (dlq, _store) = dlq_with_store(DlqConfig::default());
    add_event(&dlq, "evt-1", 3, RetryPolicy::Immediate).await;

    let due = dlq.get_retryable_events(10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].event_id, "evt-1");
    assert_eq!(due[0].retry_count, 0);
}

#[tokio::test]
async fn test_due_entries_come_back_ascending_and_capped() {
    let (dlq, store) = dlq_with_store(DlqConfig::default());

    for id in ["evt-a", "evt-b", "evt-c"] {
        add_event(&dlq, id, 3, RetryPolicy::Immediate).await;
    }

    // Force distinct, known schedule times
    let now = Utc::now().timestamp_millis();
    store
        .sorted_set_add(DLQ_RETRY_INDEX_KEY, "evt-c", now - 300)
        .await
        .unwrap();
    store
        .sorted_set_add(DLQ_RETRY_INDEX_KEY, "evt-a", now - 200)
        .await
        .unwrap();
    store
        .sorted_set_add(DLQ_RETRY_INDEX_KEY, "evt-b", now - 100)
        .await
        .unwrap();

    let due = dlq.get_retryable_events(10).await.unwrap();
    let ids: Vec<&str> = due.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["evt-c", "evt-a", "evt-b"]);

    let capped = dlq.get_retryable_events(2).await.unwrap();
    assert_eq!(capped.len(), 2);
}

#[tokio::test]
async fn test_successful_retry_removes_entry_and_repeat_is_noop() {
    let (dlq, store) = dlq_with_store(DlqConfig::default());
    add_event(&dlq, "evt-1", 3, RetryPolicy::Immediate).await;

    let retried = dlq
        .retry_event("evt-1", |payload| async move {
            assert_eq!(payload["doc"], "evt-1");
            Ok(())
        })
        .await
        .unwrap();
    assert!(retried);

    // Gone from both structures
    assert!(dlq.get_entry("evt-1").await.unwrap().is_none());
    assert_eq!(
        store
            .sorted_set_score(DLQ_RETRY_INDEX_KEY, "evt-1")
            .await
            .unwrap(),
        None
    );

    // Second call is an idempotent no-op
    let retried_again = dlq
        .retry_event("evt-1", |_| async { Ok(()) })
        .await
        .unwrap();
    assert!(!retried_again);
}

#[tokio::test]
async fn test_exhaustion_after_max_retries_keeps_record() {
    let (dlq, _store) = dlq_with_store(DlqConfig {
        base_delay_secs: 0,
        ..DlqConfig::default()
    });
    add_event(&dlq, "evt-1", 3, RetryPolicy::Immediate).await;

    for _ in 0..3 {
        let ok = dlq
            .retry_event("evt-1", |_| async { anyhow::bail!("still broken") })
            .await
            .unwrap();
        assert!(!ok);
    }

    // No longer scheduled for retry
    let due = dlq.get_retryable_events(10).await.unwrap();
    assert!(due.is_empty());

    // Record persists as a permanent failure marker
    let entry = dlq.get_entry("evt-1").await.unwrap().unwrap();
    assert_eq!(entry.retry_count, 3);
    assert!(entry.is_exhausted());
    assert_eq!(entry.failure_reason, "still broken");
}

#[tokio::test]
async fn test_exponential_schedule_and_exit_from_retry_set() {
    // Scenario: base 1s, max_retries 2, exponential backoff
    let (dlq, store) = dlq_with_store(DlqConfig {
        base_delay_secs: 1,
        max_delay_secs: 3600,
        ..DlqConfig::default()
    });
    add_event(&dlq, "evt-1", 2, RetryPolicy::ExponentialBackoff).await;

    // Initial schedule: now + base * 2^0
    let now = Utc::now().timestamp_millis();
    let score = store
        .sorted_set_score(DLQ_RETRY_INDEX_KEY, "evt-1")
        .await
        .unwrap()
        .unwrap();
    assert!((score - now - 1_000).abs() < 500, "initial score {score}");

    // First failure: rescheduled at now + 2s
    dlq.retry_event("evt-1", |_| async { anyhow::bail!("no") })
        .await
        .unwrap();
    let now = Utc::now().timestamp_millis();
    let score = store
        .sorted_set_score(DLQ_RETRY_INDEX_KEY, "evt-1")
        .await
        .unwrap()
        .unwrap();
    assert!((score - now - 2_000).abs() < 500, "first retry score {score}");

    // Second failure exhausts the entry: out of the index, record kept
    dlq.retry_event("evt-1", |_| async { anyhow::bail!("no") })
        .await
        .unwrap();
    let now = Utc::now().timestamp_millis();
    assert_eq!(
        store
            .sorted_set_score(DLQ_RETRY_INDEX_KEY, "evt-1")
            .await
            .unwrap(),
        None
    );

    // The parked record still reads the schedule the policy computed:
    // now + base * 2^2 = now + 4s
    let entry = dlq.get_entry("evt-1").await.unwrap().unwrap();
    assert!(entry.is_exhausted());
    let scheduled = entry.next_retry_at.timestamp_millis();
    assert!(
        (scheduled - now - 4_000).abs() < 500,
        "exhausted schedule {scheduled}"
    );
}

#[tokio::test]
async fn test_dangling_index_member_is_skipped() {
    let (dlq, store) = dlq_with_store(DlqConfig::default());
    add_event(&dlq, "evt-real", 3, RetryPolicy::Immediate).await;

    // Simulate a crash between the index write and the map write
    store
        .sorted_set_add(DLQ_RETRY_INDEX_KEY, "evt-ghost", 0)
        .await
        .unwrap();

    let due = dlq.get_retryable_events(10).await.unwrap();
    let ids: Vec<&str> = due.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["evt-real"]);
}

#[tokio::test]
async fn test_exhausted_on_arrival_is_never_indexed() {
    let (dlq, store) = dlq_with_store(DlqConfig::default());

    // max_retries 0: parked immediately, never scheduled
    add_event(&dlq, "evt-dead", 0, RetryPolicy::Immediate).await;

    assert_eq!(
        store
            .sorted_set_score(DLQ_RETRY_INDEX_KEY, "evt-dead")
            .await
            .unwrap(),
        None
    );
    assert!(dlq.get_entry("evt-dead").await.unwrap().is_some());
    assert!(dlq.get_retryable_events(10).await.unwrap().is_empty());
}
