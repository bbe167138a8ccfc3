//! Saga transactions: multi-step distributed operations with per-step
//! compensation.
//!
//! Workflows are expressed purely as data (`SagaStepSpec`); the orchestrator
//! resolves action descriptors against registered service clients at
//! execution time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a single saga step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Compensated,
}

/// Overall status of a saga transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Running,
    Completed,
    Failed,
    Compensating,
    Compensated,
}

impl SagaStatus {
    /// Whether the saga has reached a state the driver will not advance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Compensated)
    }
}

/// Declarative description of one step, supplied at saga creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStepSpec {
    /// Target service name, resolved against the client registry
    pub service: String,

    /// Action descriptor understood by the target service
    pub action: String,

    /// Payload for the action
    pub payload: serde_json::Value,

    /// Action descriptor that semantically undoes a completed step
    pub compensation_action: String,

    /// Payload for the compensating action
    pub compensation_payload: serde_json::Value,

    /// Per-step attempt limit; orchestrator default when absent
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// One step of a saga transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStep {
    /// Unique id of this step within the saga
    pub step_id: String,

    /// Target service name
    pub service: String,

    /// Action descriptor
    pub action: String,

    /// Action payload
    pub payload: serde_json::Value,

    /// Compensating action descriptor
    pub compensation_action: String,

    /// Compensating action payload
    pub compensation_payload: serde_json::Value,

    /// Current step status
    pub status: SagaStepStatus,

    /// Error from the last failed attempt
    pub error: Option<String>,

    /// Failed attempts so far
    pub retry_count: u32,

    /// Attempts before the step is declared failed
    pub max_retries: u32,
}

impl SagaStep {
    /// Build a step from its declarative spec.
    pub fn from_spec(spec: SagaStepSpec, default_max_retries: u32) -> Self {
        Self {
            step_id: Uuid::new_v4().to_string(),
            service: spec.service,
            action: spec.action,
            payload: spec.payload,
            compensation_action: spec.compensation_action,
            compensation_payload: spec.compensation_payload,
            status: SagaStepStatus::Pending,
            error: None,
            retry_count: 0,
            max_retries: spec.max_retries.unwrap_or(default_max_retries),
        }
    }
}

/// A multi-step distributed transaction.
///
/// Steps execute in list order. Compensation, when triggered, runs in
/// reverse order over COMPLETED steps only. The transaction is persisted as
/// a single record after every transition so a crashed driver can resume or
/// compensate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaTransaction {
    /// Unique saga id
    pub saga_id: String,

    /// Correlation id linking the saga to its originating event flow
    pub correlation_id: String,

    /// Ordered steps
    pub steps: Vec<SagaStep>,

    /// Overall status
    pub status: SagaStatus,

    /// When the saga was created
    pub created_at: DateTime<Utc>,

    /// When the saga was last persisted
    pub updated_at: DateTime<Utc>,

    /// Overall error, set when the saga fails
    pub error: Option<String>,
}

impl SagaTransaction {
    /// Create a new running transaction from step specs.
    pub fn new(correlation_id: &str, specs: Vec<SagaStepSpec>, default_max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            saga_id: Uuid::new_v4().to_string(),
            correlation_id: correlation_id.to_string(),
            steps: specs
                .into_iter()
                .map(|s| SagaStep::from_spec(s, default_max_retries))
                .collect(),
            status: SagaStatus::Running,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// Bump the update timestamp; called before every persist.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Indices of steps needing compensation, in reverse execution order.
    pub fn compensation_indices(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, step)| step.status == SagaStepStatus::Completed)
            .map(|(i, _)| i)
            .collect()
    }
}
