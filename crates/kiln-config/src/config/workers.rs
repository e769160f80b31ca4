use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::helpers::{
    default_idle_timeout_ms, default_parallel_jobs, default_pool_name, default_workers,
};

/// Worker pool settings handed to the pipeline driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Threads dedicated to script transformation
    #[serde(default = "default_workers")]
    pub script_workers: usize,

    /// Threads dedicated to stylesheet transformation
    #[serde(default = "default_workers")]
    pub style_workers: usize,

    /// Upper bound on jobs dispatched to a warm pool in one batch
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: usize,

    /// Warm pools unused for this long are reclaimed
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Prefix for worker thread names
    #[serde(default = "default_pool_name")]
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            script_workers: default_workers(),
            style_workers: default_workers(),
            parallel_jobs: default_parallel_jobs(),
            idle_timeout_ms: default_idle_timeout_ms(),
            name: default_pool_name(),
        }
    }
}

impl WorkerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}
