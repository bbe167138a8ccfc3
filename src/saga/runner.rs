//! Background poller that drives RUNNING sagas to completion.
//!
//! Same shape as the dead-letter processor: one tokio task, fetch a batch,
//! drive each sequentially, sleep, repeat. Gives crash recovery for sagas
//! whose synchronous driver died mid-flight. Run a single instance; there
//! is no claim step, so two runners could drive the same saga concurrently.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::SagaOrchestrator;
use crate::config::SagaConfig;

/// Periodic driver for sagas left in RUNNING state.
pub struct SagaRunner {
    orchestrator: Arc<SagaOrchestrator>,
    config: SagaConfig,
    running: Option<RunningLoop>,
}

struct RunningLoop {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SagaRunner {
    pub fn new(orchestrator: Arc<SagaOrchestrator>, config: SagaConfig) -> Self {
        Self {
            orchestrator,
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
            warn!("saga runner already running, start ignored");
            return;
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let orchestrator = Arc::clone(&self.orchestrator);
        let interval = self.config.poll_interval();
        let batch_size = self.config.batch_size;

        let task = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "saga runner started");

            loop {
                run_iteration(&orchestrator, batch_size).await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.recv() => {
                        info!("saga runner stopping");
                        break;
                    }
                }
            }
        });

        self.running = Some(RunningLoop { stop_tx, task });
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(()).await;
            running.task.await?;
        }
        Ok(())
    }
}

async fn run_iteration(orchestrator: &SagaOrchestrator, batch_size: usize) {
    let saga_ids = match orchestrator.list_running(batch_size).await {
        Ok(ids) => ids,
        Err(err) => {
            error!(%err, "failed to list running sagas");
            return;
        }
    };

    for saga_id in saga_ids {
        match orchestrator.execute_saga(&saga_id).await {
            Ok(status) => {
                debug!(%saga_id, ?status, "saga driven to terminal state");
            }
            Err(err) => {
                error!(%saga_id, %err, "saga drive hit store error");
            }
        }
    }
}
