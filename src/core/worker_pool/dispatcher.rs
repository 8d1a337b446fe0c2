//! Public entry point: `execute`, `submit` and lifecycle control.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, trace};
use uuid::Uuid;

use crate::builders::WorkerPoolBuilder;
use crate::config::WorkerPoolConfig;
use crate::core::error::{AppResult, PoolError};
use crate::core::handle::ResultHandle;
use crate::core::observer::{ExceptionObserver, MonitoringHook};
use crate::core::rejection::RejectionPolicy;
use crate::core::task::Task;

use super::state::{Shared, Sizing};
use super::worker::ThreadFactory;
use super::{AdmissionOutcome, PoolMetricsSnapshot, PoolStats, RunState};

/// Bounded, elastic pool of worker threads.
///
/// Not `Clone`: share it behind an `Arc`. Dropping the pool starts a graceful
/// shutdown but does not wait for workers; call [`shutdown`](Self::shutdown)
/// and [`await_termination`](Self::await_termination) for an orderly stop.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.id)
            .field("metrics", &self.snapshot_metrics())
            .field("run_state", &self.run_state())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool with default collaborators and the configured rejection policy.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        WorkerPoolBuilder::new(config).build()
    }

    /// Start a builder for supplying custom collaborators.
    #[must_use]
    pub fn builder(config: WorkerPoolConfig) -> WorkerPoolBuilder {
        WorkerPoolBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: &WorkerPoolConfig,
        policy: Arc<dyn RejectionPolicy>,
        factory: Arc<dyn ThreadFactory>,
        hook: MonitoringHook,
    ) -> Self {
        let sizing = Sizing {
            core_size: config.core_size,
            max_size: config.max_size,
            keep_alive: config.keep_alive(),
            queue_capacity: config.queue_capacity,
        };
        let shared = Arc::new(Shared::new(sizing, policy, factory, hook));
        info!(
            pool_id = %shared.id,
            core_size = config.core_size,
            max_size = config.max_size,
            queue_capacity = config.queue_capacity,
            keep_alive_ms = config.keep_alive_ms,
            "WorkerPool initialized"
        );
        Self { shared }
    }

    /// Identifier used to tag this pool's log lines.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Submit a task without a handle.
    ///
    /// Returns as soon as admission is decided. If the body later fails, the
    /// failure is visible only through the exception observer.
    pub fn execute<F>(&self, body: F) -> AdmissionOutcome
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        let task = Task::fire_and_forget(self.shared.next_task_id(), body);
        self.shared.dispatch(task)
    }

    /// Submit a task and get a handle to its outcome.
    ///
    /// Admission errors complete the handle immediately with
    /// `Failed(AdmissionRejected)` or `Failed(ShutdownRejected)`; a failing
    /// body completes it with `Failed(TaskFailed)` and is not reported to the
    /// exception observer.
    pub fn submit<F, T>(&self, body: F) -> ResultHandle<T>
    where
        F: FnOnce() -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = Task::result_tracked(self.shared.next_task_id(), body);
        let outcome = self.shared.dispatch(task);
        trace!(pool_id = %self.shared.id, task_id = handle.id(), ?outcome, "submit admission decided");
        handle
    }

    /// Stop accepting work; queued and running tasks still complete.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    /// Stop accepting work, drop the queue and stop workers after their current task.
    ///
    /// Returns the tasks that were queued but never started. Dropping a
    /// returned result-tracked task completes its handle with `Cancelled`.
    pub fn shutdown_now(&self) -> Vec<Task> {
        self.shared.shutdown_now()
    }

    /// Block until the pool is terminated or `timeout` elapses.
    ///
    /// Returns whether the pool reached `Terminated`.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.shared.await_termination(timeout)
    }

    /// Start idle core workers ahead of demand. Returns how many were started.
    pub fn prestart_core_workers(&self) -> usize {
        self.shared.prestart_core_workers()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.shared.run_state()
    }

    /// Whether `shutdown` or `shutdown_now` was called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.run_state() != RunState::Running
    }

    /// Whether every worker has exited after shutdown.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.run_state() == RunState::Terminated
    }

    /// Pool size, active workers and queue length.
    #[must_use]
    pub fn snapshot_metrics(&self) -> PoolMetricsSnapshot {
        self.shared.snapshot()
    }

    /// Snapshot plus lifetime counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// The pool's exception observer.
    #[must_use]
    pub fn observer(&self) -> &ExceptionObserver {
        self.shared.observer()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join: workers finish queued work and exit.
        self.shared.shutdown();
    }
}
