//! End-to-End Pipeline Tests
//!
//! Walks the full producer flow: stamp → persist → fail → dead-letter →
//! background retry → success, with duplicate detection along the way.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ballast::store::MemoryStore;
use ballast::{
    DeadLetterQueue, DlqConfig, DlqProcessor, EventOrderer, EventPriority, EventReplayManager,
    ProcessorFn, ReliabilityConfig, ReplayFilter, RetryPolicy,
};

/// Quiet by default; RUST_LOG=debug to watch the flow
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

#[tokio::test]
async fn test_failed_event_recovers_through_dlq() {
    init_tracing();

    let config = ReliabilityConfig::for_service("ingest");
    let store = Arc::new(MemoryStore::new());

    let orderer = EventOrderer::new(
        &config.service_name,
        config.dedup.clone(),
        config.dlq.default_max_retries,
    );
    let replay = EventReplayManager::new(store.clone(), config.replay.clone());
    let dlq = Arc::new(DeadLetterQueue::new(
        store.clone(),
        DlqConfig {
            base_delay_secs: 0,
            poll_interval_secs: 0,
            ..config.dlq.clone()
        },
    ));

    // Producer stamps and persists the event
    let metadata = orderer.create_event_metadata(EventPriority::High, "corr-1");
    let payload = serde_json::json!({"doc": "report.pdf"});
    let event_id = replay
        .persist_event(
            "document.ingested",
            "documents",
            payload.clone(),
            metadata.clone(),
            "corr-1",
            &config.service_name,
        )
        .await
        .unwrap();

    // Redelivery of the same id inside the window is flagged
    assert!(!orderer.is_duplicate(&event_id));
    assert!(orderer.is_duplicate(&event_id));

    // First processing attempt fails; the event is parked
    dlq.add_failed_event(
        &event_id,
        "document.ingested",
        payload,
        metadata,
        "analysis service unavailable",
        RetryPolicy::Immediate,
    )
    .await
    .unwrap();

    // Processor recovers after two more failures
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let processor: ProcessorFn = Arc::new(move |_payload| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("analysis service still down");
            }
            Ok(())
        })
    });

    let mut proc = DlqProcessor::new(
        Arc::clone(&dlq),
        processor,
        DlqConfig {
            poll_interval_secs: 0,
            ..DlqConfig::default()
        },
    );
    proc.start();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    proc.stop().await.unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(dlq.get_entry(&event_id).await.unwrap().is_none());

    // The durable history still answers for the correlation id
    let replayed = replay
        .replay_events(&ReplayFilter {
            correlation_id: Some("corr-1".to_string()),
            ..ReplayFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(replayed, vec![event_id]);
}

#[tokio::test]
async fn test_configured_retry_limit_bounds_dlq_attempts() {
    init_tracing();

    let mut config = ReliabilityConfig::for_service("ingest");
    config.dlq.default_max_retries = 1;
    config.dlq.base_delay_secs = 0;

    let store = Arc::new(MemoryStore::new());
    let orderer = EventOrderer::new(
        &config.service_name,
        config.dedup.clone(),
        config.dlq.default_max_retries,
    );
    let dlq = DeadLetterQueue::new(store.clone(), config.dlq.clone());

    let metadata = orderer.create_event_metadata(EventPriority::Normal, "corr-2");
    assert_eq!(metadata.max_retries, 1);

    dlq.add_failed_event(
        "evt-limited",
        "document.ingested",
        serde_json::json!({}),
        metadata,
        "first failure",
        RetryPolicy::Immediate,
    )
    .await
    .unwrap();

    // A single failed retry exhausts the entry
    dlq.retry_event("evt-limited", |_| async { anyhow::bail!("still down") })
        .await
        .unwrap();

    assert!(dlq.get_retryable_events(10).await.unwrap().is_empty());
    let entry = dlq.get_entry("evt-limited").await.unwrap().unwrap();
    assert!(entry.is_exhausted());
    assert_eq!(entry.max_retries, 1);
}
