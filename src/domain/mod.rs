//! Data structures shared by the reliability subsystems.
//!
//! Everything here is a flat, serde-serializable record. Tagged variants
//! (priority, retry policy, statuses) serialize as their SCREAMING_SNAKE
//! string value so that records written by other service instances parse
//! back cleanly.

pub mod dlq;
pub mod metadata;
pub mod replay;
pub mod saga;

pub use dlq::{DlqEntry, RetryPolicy};
pub use metadata::{EventMetadata, EventPriority};
pub use replay::ReplayableEvent;
pub use saga::{SagaStatus, SagaStep, SagaStepSpec, SagaStepStatus, SagaTransaction};
