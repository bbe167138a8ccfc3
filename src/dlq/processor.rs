//! Background retry loop for the dead-letter queue.
//!
//! One tokio task per processor: fetch a batch of due entries, retry each
//! sequentially through the caller-supplied processor function, sleep,
//! repeat. Errors are logged and never halt the loop. Run a single instance
//! per queue; there is no claim step, so concurrent processors may race on
//! the same due entry and the processor function must be idempotent.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::DeadLetterQueue;
use crate::config::DlqConfig;

/// Caller-supplied function that re-executes the original operation for a
/// parked event payload.
pub type ProcessorFn = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync,
>;

/// Periodic retry driver for due dead-letter entries.
pub struct DlqProcessor {
    dlq: Arc<DeadLetterQueue>,
    processor: ProcessorFn,
    config: DlqConfig,
    running: Option<RunningLoop>,
}

struct RunningLoop {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl DlqProcessor {
    pub fn new(dlq: Arc<DeadLetterQueue>, processor: ProcessorFn, config: DlqConfig) -> Self {
        Self {
            dlq,
            processor,
            config,
            running: None,
        }
    }

    /// Whether the background loop is active.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start the background loop. Idempotent: a second call is a no-op.
    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("dlq processor already running, start ignored");
            return;
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let dlq = Arc::clone(&self.dlq);
        let processor = Arc::clone(&self.processor);
        let interval = self.config.poll_interval();
        let batch_size = self.config.batch_size;

        let task = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "dlq processor started");

            loop {
                run_iteration(&dlq, &processor, batch_size).await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.recv() => {
                        info!("dlq processor stopping");
                        break;
                    }
                }
            }
        });

        self.running = Some(RunningLoop { stop_tx, task });
    }

    /// Stop the loop and wait for the task to finish.
    ///
    /// No iteration survives this call. Stopping a stopped processor is a
    /// no-op.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(()).await;
            running.task.await?;
        }
        Ok(())
    }
}

/// One fetch-and-retry pass. Failures are logged, never propagated, so one
/// bad entry or a store hiccup cannot halt the loop.
async fn run_iteration(dlq: &DeadLetterQueue, processor: &ProcessorFn, batch_size: usize) {
    let entries = match dlq.get_retryable_events(batch_size).await {
        Ok(entries) => entries,
        Err(err) => {
            error!(%err, "failed to fetch retryable events");
            return;
        }
    };

    if entries.is_empty() {
        return;
    }

    debug!(count = entries.len(), "retrying due dead-letter entries");

    for entry in entries {
        match dlq
            .retry_event(&entry.event_id, |payload| processor(payload))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(event_id = %entry.event_id, "retry attempt did not succeed");
            }
            Err(err) => {
                error!(event_id = %entry.event_id, %err, "retry attempt hit store error");
            }
        }
    }
}
