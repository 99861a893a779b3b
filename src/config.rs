//! Engine configuration
//!
//! Loaded from a JSON file; every key is optional and falls back to its
//! default. Immutable after startup.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::observability::Severity;

/// Tunables for distributed execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// How long a partial result may wait for its job to register (default: 10000)
    #[serde(default = "default_context_wait_timeout_ms")]
    pub context_wait_timeout_ms: u64,

    /// Deadline for a job result once registered (default: 60000)
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,

    /// How long finished jobs and recorded timeouts are remembered (default: 60000)
    #[serde(default = "default_job_retention_ms")]
    pub job_retention_ms: u64,

    /// Maximum rows carried by one result request (default: 1000)
    #[serde(default = "default_rows_per_request")]
    pub rows_per_request: usize,

    /// Shard pipelines run concurrently per node (default: 4)
    #[serde(default = "default_max_concurrent_shards")]
    pub max_concurrent_shards: usize,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_context_wait_timeout_ms() -> u64 {
    10_000
}

fn default_job_timeout_ms() -> u64 {
    60_000
}

fn default_job_retention_ms() -> u64 {
    60_000
}

fn default_rows_per_request() -> usize {
    1_000
}

fn default_max_concurrent_shards() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_wait_timeout_ms: default_context_wait_timeout_ms(),
            job_timeout_ms: default_job_timeout_ms(),
            job_retention_ms: default_job_retention_ms(),
            rows_per_request: default_rows_per_request(),
            max_concurrent_shards: default_max_concurrent_shards(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Reads and validates a JSON config file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            EngineError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> EngineResult<Self> {
        let config: EngineConfig =
            serde_json::from_str(raw).map_err(|e| EngineError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects zero timeouts and sizes and unknown log levels
    pub fn validate(&self) -> EngineResult<()> {
        if self.context_wait_timeout_ms == 0 {
            return Err(EngineError::config("context_wait_timeout_ms must be positive"));
        }
        if self.job_timeout_ms == 0 {
            return Err(EngineError::config("job_timeout_ms must be positive"));
        }
        if self.job_retention_ms == 0 {
            return Err(EngineError::config("job_retention_ms must be positive"));
        }
        if self.rows_per_request == 0 {
            return Err(EngineError::config("rows_per_request must be positive"));
        }
        if self.max_concurrent_shards == 0 {
            return Err(EngineError::config("max_concurrent_shards must be positive"));
        }
        self.severity()?;
        Ok(())
    }

    pub fn severity(&self) -> EngineResult<Severity> {
        Severity::parse(&self.log_level)
            .ok_or_else(|| EngineError::config(format!("unknown log level {}", self.log_level)))
    }

    pub fn context_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.context_wait_timeout_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_millis(self.job_retention_ms)
    }
}
