//! Error types for admission, execution and result retrieval.

use std::any::Any;

use thiserror::Error;

use super::worker_pool::PoolMetricsSnapshot;

/// Errors produced by the worker pool and its result handles.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The queue is full and the pool already runs `max_size` workers.
    #[error("task rejected: queue full and pool at max size ({snapshot})")]
    AdmissionRejected {
        /// Pool metrics at the moment of rejection.
        snapshot: PoolMetricsSnapshot,
    },
    /// The pool no longer accepts work because shutdown was initiated.
    #[error("task rejected: pool is shutting down")]
    ShutdownRejected,
    /// The task body returned an error or panicked.
    #[error(transparent)]
    TaskFailed(#[from] TaskFailure),
    /// The rejection policy dropped the task.
    #[error("task discarded by rejection policy")]
    Discarded,
    /// The task was destroyed before it ever ran.
    #[error("task cancelled before it ran")]
    Cancelled,
    /// Waiting on a result handle timed out.
    #[error("operation timed out")]
    Timeout,
    /// The handle's result was already moved out by an earlier call.
    #[error("result already taken from handle")]
    ResultTaken,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PoolError {
    /// Returns true for errors raised synchronously by admission control.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::AdmissionRejected { .. } | Self::ShutdownRejected)
    }
}

/// Failure raised by a task body while it executed.
#[derive(Debug, Error)]
pub enum TaskFailure {
    /// The body returned `Err`.
    #[error("task failed: {0:#}")]
    Error(anyhow::Error),
    /// The body panicked; carries the panic message.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskFailure {
    /// Build a failure from a payload caught with `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }

    /// Whether the body panicked rather than returning an error.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// Result alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Application-facing result using anyhow; task bodies return this.
pub type AppResult<T> = Result<T, anyhow::Error>;
