//! ballast - reliability layer for event-driven service pipelines
//!
//! Coordinates distributed work among independent services: per-producer
//! event ordering with duplicate detection, a dead-letter queue with
//! pluggable retry policies, saga transactions with compensating rollback,
//! and a durable, queryable event history.
//!
//! # Architecture
//!
//! All four subsystems are stateless coordinators over a shared durable
//! store ([`store::DurableStore`]: key→hash maps plus score-ordered sets
//! with atomic single-key operations), which is what lets multiple service
//! instances cooperate safely:
//!
//! - [`ordering::EventOrderer`]: monotonic sequence ids, bounded-window dedup
//! - [`dlq::DeadLetterQueue`] + [`dlq::DlqProcessor`]: durable failure
//!   capture and scheduled retries
//! - [`saga::SagaOrchestrator`] + [`saga::SagaRunner`]: multi-step
//!   transactions with reverse-order compensation
//! - [`replay::EventReplayManager`]: persistent, filterable event history
//!
//! # Flow
//!
//! A producer stamps an event via the orderer, persists it via the replay
//! manager, and attempts processing; on failure the event goes to the
//! dead-letter queue, where the processor retries it until success or
//! exhaustion. Cross-service workflows are expressed as saga step data and
//! driven by the orchestrator, synchronously or through the runner.
//!
//! Delivery is at-least-once with bounded-window deduplication; processor
//! functions and service clients must be idempotent.

pub mod config;
pub mod dlq;
pub mod domain;
pub mod ordering;
pub mod replay;
pub mod saga;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::{DedupConfig, DlqConfig, ReliabilityConfig, ReplayConfig, SagaConfig};
pub use dlq::{DeadLetterQueue, DlqError, DlqProcessor, ProcessorFn};
pub use domain::{
    DlqEntry, EventMetadata, EventPriority, ReplayableEvent, RetryPolicy, SagaStatus, SagaStep,
    SagaStepSpec, SagaStepStatus, SagaTransaction,
};
pub use ordering::EventOrderer;
pub use replay::{EventReplayManager, ReplayError, ReplayFilter};
pub use saga::{SagaError, SagaOrchestrator, SagaRunner, ServiceClient};
pub use store::{DurableStore, MemoryStore, StoreError};
