//! Pool configuration

use crate::core::{PoolError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a worker pool
///
/// The configuration is plain data and can be loaded from JSON:
///
/// ```rust
/// use fanout_pool::PoolConfig;
///
/// let config: PoolConfig = serde_json::from_str(
///     r#"{ "num_workers": 3, "thread_name_prefix": "resize" }"#,
/// ).unwrap();
/// assert_eq!(config.num_workers, 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads per run.
    ///
    /// Zero is accepted: a producer run then consumes nothing and its result
    /// stream closes immediately. Slice runs clamp this to the slice length.
    pub num_workers: usize,
    /// Prefix for the names of the pool's threads
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            thread_name_prefix: "pool".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with exactly `num_workers` workers
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Set the number of workers
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.thread_name_prefix.is_empty() {
            return Err(PoolError::invalid_config(
                "thread_name_prefix",
                "Thread name prefix must not be empty",
            ));
        }
        // std::thread::Builder panics on interior NUL bytes
        if self.thread_name_prefix.contains('\0') {
            return Err(PoolError::invalid_config(
                "thread_name_prefix",
                "Thread name prefix must not contain NUL bytes",
            ));
        }
        Ok(())
    }

    pub(crate) fn thread_name(&self, role: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, role)
    }
}
