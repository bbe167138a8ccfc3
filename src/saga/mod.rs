//! Saga orchestration: multi-step distributed transactions with
//! compensating rollback.
//!
//! Workflows are pure data ([`SagaStepSpec`] lists, see [`catalog`]); the
//! orchestrator resolves each step's service name against a registry of
//! [`ServiceClient`]s and drives actions and compensations through them.
//! The transaction record is persisted after every transition so a crashed
//! driver leaves enough state for the runner to resume or compensate.

pub mod catalog;
mod runner;

pub use runner::SagaRunner;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SagaConfig;
use crate::domain::{SagaStatus, SagaStepSpec, SagaStepStatus, SagaTransaction};
use crate::store::{DurableStore, StoreError, SAGA_TRANSACTIONS_KEY};

/// Errors surfaced by saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("saga not found: {0}")]
    NotFound(String),

    #[error("no client registered for service: {0}")]
    UnknownService(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("corrupt saga record for {saga_id}: {source}")]
    CorruptRecord {
        saga_id: String,
        source: serde_json::Error,
    },

    #[error("failed to serialize saga record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Client for one target service, registered per service name.
///
/// Action descriptors are opaque to the orchestrator; the client maps them
/// to whatever transport it speaks. Both calls are expected to perform
/// network I/O and must be idempotent, since a crashed driver may re-run a
/// step whose effect already landed.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Perform a step action. The returned value is informational only.
    async fn execute(
        &self,
        action: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    /// Semantically undo a previously completed action.
    async fn compensate(&self, action: &str, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Creates, tracks and drives saga transactions.
pub struct SagaOrchestrator {
    store: Arc<dyn DurableStore>,
    clients: RwLock<HashMap<String, Arc<dyn ServiceClient>>>,
    config: SagaConfig,
}

impl SagaOrchestrator {
    pub fn new(store: Arc<dyn DurableStore>, config: SagaConfig) -> Self {
        Self {
            store,
            clients: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register the client used for steps targeting `service`.
    pub async fn register_client(&self, service: &str, client: Arc<dyn ServiceClient>) {
        let mut clients = self.clients.write().await;
        clients.insert(service.to_string(), client);
    }

    /// Create a saga from step specs and persist it in RUNNING state.
    ///
    /// Creation does not execute anything; the caller either drives the
    /// saga synchronously via [`execute_saga`](Self::execute_saga) or lets a
    /// [`SagaRunner`] pick it up.
    pub async fn create_saga(
        &self,
        correlation_id: &str,
        steps: Vec<SagaStepSpec>,
    ) -> Result<String, SagaError> {
        let saga = SagaTransaction::new(correlation_id, steps, self.config.default_step_retries);
        let saga_id = saga.saga_id.clone();

        self.persist(&saga).await?;
        info!(
            %saga_id,
            correlation_id,
            steps = saga.steps.len(),
            "saga created"
        );

        Ok(saga_id)
    }

    /// Snapshot of a transaction, or `None` if unknown.
    pub async fn get_saga_status(
        &self,
        saga_id: &str,
    ) -> Result<Option<SagaTransaction>, SagaError> {
        let raw = self.store.hash_get(SAGA_TRANSACTIONS_KEY, saga_id).await?;
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|source| SagaError::CorruptRecord {
                saga_id: saga_id.to_string(),
                source,
            })
        })
        .transpose()
    }

    /// Ids of sagas in a non-terminal state, for the background runner.
    pub async fn list_running(&self, limit: usize) -> Result<Vec<String>, SagaError> {
        let mut running = Vec::new();
        for json in self.store.hash_values(SAGA_TRANSACTIONS_KEY).await? {
            let saga: SagaTransaction = match serde_json::from_str(&json) {
                Ok(saga) => saga,
                Err(err) => {
                    warn!(%err, "skipping corrupt saga record");
                    continue;
                }
            };
            if !saga.status.is_terminal() {
                running.push(saga.saga_id);
                if running.len() >= limit {
                    break;
                }
            }
        }
        Ok(running)
    }

    /// Drive a saga to a terminal state.
    ///
    /// Steps execute in list order; already-completed steps are skipped, so
    /// re-driving a saga after a crash resumes where it left off. Each step
    /// retries its action up to its own limit. On step failure the
    /// completed steps are compensated in reverse order and the saga ends
    /// COMPENSATED; a compensation error ends it FAILED and is left for
    /// alerting rather than retried.
    #[instrument(skip(self))]
    pub async fn execute_saga(&self, saga_id: &str) -> Result<SagaStatus, SagaError> {
        let mut saga = self
            .get_saga_status(saga_id)
            .await?
            .ok_or_else(|| SagaError::NotFound(saga_id.to_string()))?;

        if saga.status.is_terminal() {
            debug!(saga_id, status = ?saga.status, "saga already terminal");
            return Ok(saga.status);
        }

        // A drive that died mid-rollback resumes compensating, not executing
        if saga.status == SagaStatus::Compensating {
            return self.compensate(&mut saga).await;
        }

        for index in 0..saga.steps.len() {
            if saga.steps[index].status == SagaStepStatus::Completed {
                continue;
            }

            saga.steps[index].status = SagaStepStatus::InProgress;
            self.persist_touched(&mut saga).await?;

            match self.run_step(&mut saga, index).await? {
                Ok(()) => {
                    saga.steps[index].status = SagaStepStatus::Completed;
                    self.persist_touched(&mut saga).await?;
                }
                Err(reason) => {
                    saga.steps[index].status = SagaStepStatus::Failed;
                    saga.steps[index].error = Some(reason.clone());
                    saga.status = SagaStatus::Compensating;
                    saga.error = Some(reason.clone());
                    self.persist_touched(&mut saga).await?;

                    warn!(saga_id, step = index, %reason, "saga step failed, compensating");
                    return self.compensate(&mut saga).await;
                }
            }
        }

        saga.status = SagaStatus::Completed;
        self.persist_touched(&mut saga).await?;
        info!(saga_id, "saga completed");

        Ok(SagaStatus::Completed)
    }

    /// Run one step's action with per-step retries.
    ///
    /// Outer `Err` is a store/serialization problem; inner `Err` is the
    /// business failure that triggers compensation.
    async fn run_step(
        &self,
        saga: &mut SagaTransaction,
        index: usize,
    ) -> Result<Result<(), String>, SagaError> {
        let (service, action, payload, max_retries) = {
            let step = &saga.steps[index];
            (
                step.service.clone(),
                step.action.clone(),
                step.payload.clone(),
                step.max_retries,
            )
        };

        let client = match self.client_for(&service).await {
            Some(client) => client,
            None => return Ok(Err(format!("no client registered for service {service}"))),
        };

        let mut last_error = String::new();
        for attempt in 0..max_retries.max(1) {
            match client.execute(&action, &payload).await {
                Ok(_) => return Ok(Ok(())),
                Err(err) => {
                    last_error = err.to_string();
                    saga.steps[index].retry_count = attempt + 1;
                    debug!(
                        saga_id = %saga.saga_id,
                        step = index,
                        attempt = attempt + 1,
                        error = %last_error,
                        "saga step attempt failed"
                    );
                    self.persist_touched(saga).await?;
                }
            }
        }

        Ok(Err(last_error))
    }

    /// Compensate completed steps in reverse order.
    async fn compensate(&self, saga: &mut SagaTransaction) -> Result<SagaStatus, SagaError> {
        for index in saga.compensation_indices() {
            let (service, action, payload) = {
                let step = &saga.steps[index];
                (
                    step.service.clone(),
                    step.compensation_action.clone(),
                    step.compensation_payload.clone(),
                )
            };

            let outcome = match self.client_for(&service).await {
                Some(client) => client.compensate(&action, &payload).await,
                None => Err(anyhow::anyhow!("no client registered for service {service}")),
            };

            match outcome {
                Ok(()) => {
                    saga.steps[index].status = SagaStepStatus::Compensated;
                    self.persist_touched(saga).await?;
                }
                Err(err) => {
                    // Escalate to alerting; compensation is never retried here
                    error!(
                        saga_id = %saga.saga_id,
                        step = index,
                        %err,
                        "saga compensation failed, manual intervention required"
                    );
                    saga.status = SagaStatus::Failed;
                    saga.error = Some(format!("compensation failed at step {index}: {err}"));
                    self.persist_touched(saga).await?;
                    return Ok(SagaStatus::Failed);
                }
            }
        }

        saga.status = SagaStatus::Compensated;
        self.persist_touched(saga).await?;
        info!(saga_id = %saga.saga_id, "saga compensated");

        Ok(SagaStatus::Compensated)
    }

    async fn client_for(&self, service: &str) -> Option<Arc<dyn ServiceClient>> {
        let clients = self.clients.read().await;
        clients.get(service).cloned()
    }

    async fn persist_touched(&self, saga: &mut SagaTransaction) -> Result<(), SagaError> {
        saga.touch();
        self.persist(saga).await
    }

    async fn persist(&self, saga: &SagaTransaction) -> Result<(), SagaError> {
        self.store
            .hash_set(
                SAGA_TRANSACTIONS_KEY,
                &saga.saga_id,
                &serde_json::to_string(saga)?,
            )
            .await?;
        Ok(())
    }
}
