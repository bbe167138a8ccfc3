//! Configuration for the reliability subsystems.
//!
//! All knobs deserialize from the owning service's config file; every field
//! has a production-safe default so an empty section works.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Name of the owning service, embedded in sequence ids
    pub service_name: String,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub dlq: DlqConfig,

    #[serde(default)]
    pub saga: SagaConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

impl ReliabilityConfig {
    /// Configuration with defaults for the given service name.
    pub fn for_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            dedup: DedupConfig::default(),
            dlq: DlqConfig::default(),
            saga: SagaConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

/// Duplicate-detection window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// How long a seen event id counts as a duplicate (default: 300s)
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum ids held in the seen-cache (default: 10_000)
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
}

fn default_dedup_ttl_secs() -> u64 {
    300
}
fn default_dedup_capacity() -> usize {
    10_000
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedup_ttl_secs(),
            capacity: default_dedup_capacity(),
        }
    }
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Dead-letter queue and processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqConfig {
    /// Base retry delay in seconds (default: 60)
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Upper bound on any computed retry delay in seconds (default: 3600)
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Retry attempts before an entry becomes a permanent failure (default: 3)
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Due entries fetched per processor iteration (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds the processor sleeps between iterations (default: 30)
    #[serde(default = "default_dlq_poll_secs")]
    pub poll_interval_secs: u64,
}

fn default_base_delay_secs() -> u64 {
    60
}
fn default_max_delay_secs() -> u64 {
    3600
}
fn default_max_retries() -> u32 {
    3
}
fn default_batch_size() -> usize {
    10
}
fn default_dlq_poll_secs() -> u64 {
    30
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            default_max_retries: default_max_retries(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_dlq_poll_secs(),
        }
    }
}

impl DlqConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Saga orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaConfig {
    /// Default per-step attempt limit (default: 3)
    #[serde(default = "default_max_retries")]
    pub default_step_retries: u32,

    /// Seconds the runner sleeps between polls for running sagas (default: 5)
    #[serde(default = "default_saga_poll_secs")]
    pub poll_interval_secs: u64,

    /// Running sagas driven per runner iteration (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_saga_poll_secs() -> u64 {
    5
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            default_step_retries: default_max_retries(),
            poll_interval_secs: default_saga_poll_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl SagaConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Event replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Replays allowed per persisted event (default: 10)
    #[serde(default = "default_max_replays")]
    pub max_replays: u32,

    /// Default result cap for replay queries (default: 100)
    #[serde(default = "default_replay_limit")]
    pub default_limit: usize,
}

fn default_max_replays() -> u32 {
    10
}
fn default_replay_limit() -> usize {
    100
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_replays: default_max_replays(),
            default_limit: default_replay_limit(),
        }
    }
}
