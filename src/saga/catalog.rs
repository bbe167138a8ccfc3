//! Catalog of domain workflows expressed purely as step data.
//!
//! Nothing here executes; each function returns the `SagaStepSpec` list for
//! one workflow, with service names resolved against the client registry at
//! run time. Keeping workflows as data is what keeps the engine generic.

use serde_json::json;

use crate::domain::SagaStepSpec;

/// Ingest a document from several sources, then merge the results.
///
/// One ingest step per source (compensated by purging that source's
/// partial output), followed by an aggregation step on the `aggregator`
/// service (compensated by discarding the merged result).
pub fn multi_source_ingestion(correlation_id: &str, sources: &[String]) -> Vec<SagaStepSpec> {
    let mut steps: Vec<SagaStepSpec> = sources
        .iter()
        .map(|source| SagaStepSpec {
            service: source.clone(),
            action: "ingest".to_string(),
            payload: json!({
                "correlation_id": correlation_id,
                "source": source,
            }),
            compensation_action: "purge".to_string(),
            compensation_payload: json!({
                "correlation_id": correlation_id,
                "source": source,
            }),
            max_retries: None,
        })
        .collect();

    steps.push(SagaStepSpec {
        service: "aggregator".to_string(),
        action: "merge".to_string(),
        payload: json!({
            "correlation_id": correlation_id,
            "sources": sources,
        }),
        compensation_action: "discard".to_string(),
        compensation_payload: json!({
            "correlation_id": correlation_id,
        }),
        max_retries: None,
    });

    steps
}

/// Fan a finished result out to notification channels.
///
/// Each channel delivery is compensated by a retraction so a failed
/// delivery never leaves a partial fan-out visible.
pub fn notification_fanout(correlation_id: &str, channels: &[String]) -> Vec<SagaStepSpec> {
    channels
        .iter()
        .map(|channel| SagaStepSpec {
            service: "notifier".to_string(),
            action: format!("deliver:{channel}"),
            payload: json!({
                "correlation_id": correlation_id,
                "channel": channel,
            }),
            compensation_action: format!("retract:{channel}"),
            compensation_payload: json!({
                "correlation_id": correlation_id,
                "channel": channel,
            }),
            max_retries: Some(1),
        })
        .collect()
}
