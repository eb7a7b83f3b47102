//! Orchestrator configuration.

use std::time::Duration;

use saga_core::defaults;

/// Configuration for the task orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of analyses running at once.
    pub max_concurrent: usize,
    /// Upper bound on one task's execution, in seconds.
    pub timeout_secs: u64,
    /// Age after which terminal tasks may be cleaned up, in hours.
    pub task_ttl_hours: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::TASK_MAX_CONCURRENT,
            timeout_secs: defaults::TASK_TIMEOUT_SECS,
            task_ttl_hours: defaults::TASK_TTL_HOURS,
        }
    }
}

impl OrchestratorConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ANALYSIS_MAX_CONCURRENT` | `4` | Max analyses in flight |
    /// | `ANALYSIS_TIMEOUT_SECS` | `300` | Per-task execution timeout |
    /// | `ANALYSIS_TASK_TTL_HOURS` | `24` | Age at which finished tasks expire |
    pub fn from_env() -> Self {
        let max_concurrent = std::env::var("ANALYSIS_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::TASK_MAX_CONCURRENT)
            .max(1);

        let timeout_secs = std::env::var("ANALYSIS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults::TASK_TIMEOUT_SECS);

        let task_ttl_hours = std::env::var("ANALYSIS_TASK_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::TASK_TTL_HOURS);

        Self {
            max_concurrent,
            timeout_secs,
            task_ttl_hours,
        }
    }

    /// Set maximum concurrent analyses.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_task_ttl_hours(mut self, hours: u64) -> Self {
        self.task_ttl_hours = hours;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_hours * 3600)
    }
}
