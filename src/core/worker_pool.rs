//! Elastic worker pool with dedicated OS threads.
//!
//! The pool keeps between `core_size` and `max_size` workers. Each arriving task
//! goes through one atomic admission decision:
//!
//! 1. fewer than `core_size` workers: start a worker bound to the task;
//! 2. queue has room: enqueue;
//! 3. fewer than `max_size` workers: start an overflow worker bound to the task;
//! 4. otherwise: ask the [`RejectionPolicy`](super::RejectionPolicy).
//!
//! Overflow workers that stay idle longer than the keep-alive retire; core
//! workers wait until shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_elastic_pool::config::WorkerPoolConfig;
//! use prometheus_elastic_pool::core::WorkerPool;
//!
//! let pool = WorkerPool::new(
//!     WorkerPoolConfig::new()
//!         .with_core_size(2)
//!         .with_max_size(5)
//!         .with_queue_capacity(10),
//! )?;
//!
//! let outcome = pool.execute(|| { do_work()?; Ok(()) });
//! let handle = pool.submit(|| Ok(40 + 2));
//! assert_eq!(handle.wait()?, 42);
//! pool.shutdown();
//! ```

mod dispatcher;
mod state;
mod worker;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::error::PoolError;

pub use dispatcher::WorkerPool;
pub use worker::{NamedThreadFactory, ThreadFactory, WorkerBody};

/// Point-in-time pool metrics, recomputed on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolMetricsSnapshot {
    /// Workers currently alive.
    pub pool_size: usize,
    /// Workers currently running a task.
    pub active_count: usize,
    /// Tasks waiting in the queue.
    pub queue_size: usize,
}

impl fmt::Display for PoolMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool_size={} active={} queued={}",
            self.pool_size, self.active_count, self.queue_size
        )
    }
}

/// Lifecycle of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Accepting work.
    Running,
    /// `shutdown` called: no admissions, queued work still drains.
    ShuttingDown,
    /// `shutdown_now` called: no admissions, queue dropped, workers stop after their current task.
    Stopping,
    /// All workers gone and the queue is empty.
    Terminated,
}

/// Result of handing a task to `execute`.
#[derive(Debug)]
#[must_use]
pub enum AdmissionOutcome {
    /// The task was handed to a worker or queued.
    Admitted,
    /// The pool was saturated and the task ran on the caller's thread.
    RanOnCaller,
    /// The pool was saturated and the rejection policy dropped the task.
    Discarded,
    /// The task was refused; see the error for the reason.
    Rejected(PoolError),
}

impl AdmissionOutcome {
    /// Whether the task was accepted by the pool or run by the caller.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted | Self::RanOnCaller)
    }

    /// Convert into a `Result`, mapping a discard to [`PoolError::Discarded`].
    ///
    /// # Errors
    ///
    /// Returns the rejection reason for `Rejected` and `Discarded` outcomes.
    pub fn into_result(self) -> Result<(), PoolError> {
        match self {
            Self::Admitted | Self::RanOnCaller => Ok(()),
            Self::Discarded => Err(PoolError::Discarded),
            Self::Rejected(error) => Err(error),
        }
    }
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Current worker count, activity and queue length.
    pub metrics: PoolMetricsSnapshot,
    /// Configured core size.
    pub core_size: usize,
    /// Configured max size.
    pub max_size: usize,
    /// Configured queue capacity.
    pub queue_capacity: usize,
    /// Highest worker count ever reached.
    pub largest_pool_size: usize,
    /// Tasks admitted to the pool.
    pub submitted_tasks: u64,
    /// Tasks that finished running, successfully or not.
    pub completed_tasks: u64,
    /// Finished tasks whose body failed.
    pub failed_tasks: u64,
    /// Tasks refused by admission or shutdown.
    pub rejected_tasks: u64,
    /// Tasks dropped by a discard policy.
    pub discarded_tasks: u64,
    /// Lifecycle state.
    pub run_state: RunState,
}

/// Counters outside the admission invariant (lock-free atomics).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub rejected: AtomicU64,
    pub discarded: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
