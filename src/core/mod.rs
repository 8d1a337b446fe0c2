//! Admission control, task execution and failure routing.

pub mod error;
pub mod handle;
pub mod observer;
pub mod rejection;
pub mod task;
pub mod worker_pool;

mod queue;

pub use error::{AppResult, PoolError, PoolResult, TaskFailure};
pub use handle::{HandleState, ResultHandle};
pub use observer::{ExceptionObserver, FailureEvent, PostTaskHook, UncaughtFailureSink};
pub use rejection::{Rejection, RejectionPolicy};
pub use task::{ExecutionRecord, SubmissionMode, Task, TaskId, TaskOutcome};
pub use worker_pool::{
    AdmissionOutcome, NamedThreadFactory, PoolMetricsSnapshot, PoolStats, RunState,
    ThreadFactory, WorkerBody, WorkerPool,
};
