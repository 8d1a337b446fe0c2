//! Exception observer and the post-task monitoring hook.
//!
//! Every finished task produces one [`ExecutionRecord`] which goes through
//! the monitoring hook before the worker looks for more work. The hook first
//! emits a metrics snapshot and runs the injected post-task callback, then
//! routes the outcome to exactly one place:
//!
//! - fire-and-forget failures: the observer's uncaught-failure channel;
//! - result-tracked tasks: the task's [`ResultHandle`](super::ResultHandle),
//!   for successes and failures alike.
//!
//! A panicking post-task callback is logged and does not stop routing.
//!
//! The observer is shared by all workers of a pool and also receives
//! worker-creation failures and discards.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::error::{PoolError, TaskFailure};
use super::task::{Delivery, ExecutionRecord, SubmissionMode, TaskId, TaskOutcome};
use super::worker_pool::PoolMetricsSnapshot;

/// Event delivered to the uncaught-failure sink.
#[derive(Debug)]
pub enum FailureEvent<'a> {
    /// A fire-and-forget task failed; nobody else will see this failure.
    Uncaught {
        /// Task identifier.
        task_id: TaskId,
        /// Thread that ran the task.
        worker: &'a str,
        /// The failure.
        failure: &'a TaskFailure,
    },
    /// A worker thread could not be created; the pool keeps running with fewer workers.
    WorkerCreationFailed {
        /// Identifier the worker would have had.
        worker_id: usize,
        /// Error returned by the thread factory.
        error: &'a io::Error,
        /// Pool metrics after the failed attempt.
        snapshot: PoolMetricsSnapshot,
    },
    /// A task was dropped by the rejection policy.
    Discarded {
        /// Task identifier.
        task_id: TaskId,
        /// Submission mode of the dropped task.
        mode: SubmissionMode,
    },
}

/// Host-supplied sink for failure events.
pub type UncaughtFailureSink = Arc<dyn Fn(&FailureEvent<'_>) + Send + Sync>;

/// Injected callback run after every task with its record and a fresh snapshot.
pub type PostTaskHook = Arc<dyn Fn(&ExecutionRecord, &PoolMetricsSnapshot) + Send + Sync>;

/// Single pool-wide sink for failures nobody else will observe.
#[derive(Default)]
pub struct ExceptionObserver {
    sink: Option<UncaughtFailureSink>,
    uncaught: AtomicU64,
    degraded: AtomicU64,
    discarded: AtomicU64,
}

impl std::fmt::Debug for ExceptionObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionObserver")
            .field("has_sink", &self.sink.is_some())
            .field("uncaught", &self.uncaught_count())
            .field("degraded", &self.degradation_count())
            .field("discarded", &self.discard_count())
            .finish()
    }
}

impl ExceptionObserver {
    /// Create an observer that forwards to `sink` in addition to logging.
    #[must_use]
    pub fn new(sink: Option<UncaughtFailureSink>) -> Self {
        Self {
            sink,
            ..Self::default()
        }
    }

    /// Report a fire-and-forget task failure.
    pub fn uncaught_failure(&self, task_id: TaskId, worker: &str, failure: &TaskFailure) {
        self.uncaught.fetch_add(1, Ordering::Relaxed);
        error!(task_id, worker, error = %failure, "uncaught task failure");
        self.emit(&FailureEvent::Uncaught {
            task_id,
            worker,
            failure,
        });
    }

    /// Report a thread factory error.
    pub fn worker_creation_failed(
        &self,
        worker_id: usize,
        error: &io::Error,
        snapshot: PoolMetricsSnapshot,
    ) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
        warn!(
            worker_id,
            error = %error,
            pool_size = snapshot.pool_size,
            queued = snapshot.queue_size,
            "failed to create worker thread; continuing with reduced capacity"
        );
        self.emit(&FailureEvent::WorkerCreationFailed {
            worker_id,
            error,
            snapshot,
        });
    }

    /// Report a task dropped by the rejection policy.
    pub fn task_discarded(&self, task_id: TaskId, mode: SubmissionMode) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        warn!(task_id, ?mode, "task discarded by rejection policy");
        self.emit(&FailureEvent::Discarded { task_id, mode });
    }

    /// Number of uncaught failures reported so far.
    #[must_use]
    pub fn uncaught_count(&self) -> u64 {
        self.uncaught.load(Ordering::Relaxed)
    }

    /// Number of worker-creation failures reported so far.
    #[must_use]
    pub fn degradation_count(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Number of discards reported so far.
    #[must_use]
    pub fn discard_count(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    fn emit(&self, event: &FailureEvent<'_>) {
        if let Some(sink) = &self.sink {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| sink(event))) {
                error!(panic = %TaskFailure::from_panic(payload), "failure sink panicked");
            }
        }
    }
}

/// Post-task hook shared by every worker of a pool.
#[derive(Clone)]
pub(crate) struct MonitoringHook {
    observer: Arc<ExceptionObserver>,
    post_task: Option<PostTaskHook>,
}

impl std::fmt::Debug for MonitoringHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringHook")
            .field("observer", &self.observer)
            .field("has_post_task", &self.post_task.is_some())
            .finish()
    }
}

impl MonitoringHook {
    /// Compose the observer with an optional injected callback.
    pub(crate) fn new(observer: Arc<ExceptionObserver>, post_task: Option<PostTaskHook>) -> Self {
        Self {
            observer,
            post_task,
        }
    }

    /// The observer failures are routed to.
    pub(crate) const fn observer(&self) -> &Arc<ExceptionObserver> {
        &self.observer
    }

    /// Consume one execution record.
    ///
    /// Order: snapshot log, post-task callback, then delivery. A result
    /// handle is therefore never completed before the callback has seen
    /// its record.
    pub(crate) fn after_execute(
        &self,
        record: ExecutionRecord,
        delivery: Option<Delivery>,
        snapshot: &PoolMetricsSnapshot,
    ) {
        debug!(
            task_id = record.task_id,
            worker = %record.worker,
            success = record.outcome.is_success(),
            pool_size = snapshot.pool_size,
            active = snapshot.active_count,
            queued = snapshot.queue_size,
            "task finished"
        );
        if let Some(post_task) = &self.post_task {
            let called = catch_unwind(AssertUnwindSafe(|| post_task(&record, snapshot)));
            if let Err(payload) = called {
                error!(
                    task_id = record.task_id,
                    worker = %record.worker,
                    panic = %TaskFailure::from_panic(payload),
                    "post-task hook panicked"
                );
            }
        }

        match (record.outcome, delivery) {
            (TaskOutcome::Success, Some(delivery)) => delivery.deliver(None),
            (TaskOutcome::Success, None) => {}
            (TaskOutcome::Failure(failure), Some(delivery)) => {
                warn!(
                    task_id = record.task_id,
                    worker = %record.worker,
                    error = %failure,
                    "result-tracked task failed; delivering to handle"
                );
                delivery.deliver(Some(PoolError::TaskFailed(failure)));
            }
            (TaskOutcome::Failure(failure), None) => {
                self.observer
                    .uncaught_failure(record.task_id, &record.worker, &failure);
            }
        }
    }
}
