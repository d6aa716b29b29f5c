//! Error types for the worker pool

/// Result type for worker pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Boxed error carried by a reported job failure
pub type JobError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while setting up or controlling a pool run
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Failed to spawn one of the pool's threads
    #[error("Failed to spawn {role} thread '{thread_name}': {message}")]
    SpawnError {
        /// Role of the thread (worker, dispatcher, supervisor)
        role: &'static str,
        /// Name the thread was given
        thread_name: String,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// A pool thread terminated abnormally and could not be joined cleanly
    #[error("Failed to join thread '{thread_name}': {message}")]
    JoinError {
        /// Name of the thread
        thread_name: String,
        /// Error message
        message: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Operation observed a cancelled token
    #[error("Cancelled: {reason}")]
    Cancelled {
        /// Reason for cancellation
        reason: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Create a spawn error
    pub fn spawn(role: &'static str, thread_name: impl Into<String>, source: std::io::Error) -> Self {
        PoolError::SpawnError {
            role,
            thread_name: thread_name.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_name: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::JoinError {
            thread_name: thread_name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        PoolError::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PoolError::Other(msg.into())
    }
}

/// A panic raised by a job callback and contained by its worker
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Job '{callback}' panicked on worker #{worker_id}: {message}")]
pub struct JobPanic {
    /// Worker that ran the callback
    pub worker_id: usize,
    /// Name of the callback
    pub callback: String,
    /// Panic message
    pub message: String,
}

impl JobPanic {
    /// Build a `JobPanic` from a payload returned by `catch_unwind`
    pub fn from_payload(
        worker_id: usize,
        callback: impl Into<String>,
        payload: &(dyn std::any::Any + Send),
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        Self {
            worker_id,
            callback: callback.into(),
            message,
        }
    }
}
