//! Units of work and the records produced when they finish.
//!
//! Every [`Task`] is tagged with its [`SubmissionMode`] when it is created. The
//! tag decides where a failure is delivered after execution: the exception
//! observer for fire-and-forget tasks, the result handle for result-tracked
//! ones.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{AppResult, PoolError, TaskFailure};
use super::handle::{result_slot, ResultHandle};

/// Identifier assigned to each task at submission.
pub type TaskId = u64;

/// How a task was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// Submitted with `execute`; the caller holds no handle.
    FireAndForget,
    /// Submitted with `submit`; the caller holds a [`ResultHandle`].
    ResultTracked,
}

/// Outcome of running a task body.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The body returned `Ok`.
    Success,
    /// The body returned `Err` or panicked.
    Failure(TaskFailure),
}

impl TaskOutcome {
    /// Whether the body completed without failure.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::Success => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Produced once per task completion and consumed by the post-task hook.
#[derive(Debug)]
pub struct ExecutionRecord {
    /// Task identifier.
    pub task_id: TaskId,
    /// Submission mode the task was tagged with.
    pub mode: SubmissionMode,
    /// Name of the thread that ran the task.
    pub worker: String,
    /// What happened.
    pub outcome: TaskOutcome,
}

/// Completes a result-tracked task's handle with the value its body produced.
type ValueCallback = Box<dyn FnOnce() + Send>;

type TaskBody = Box<dyn FnOnce() -> Result<Option<ValueCallback>, TaskFailure> + Send>;

/// Delivers a terminal error to a result-tracked task's handle.
pub(crate) type FailureCallback = Box<dyn FnOnce(PoolError) + Send>;

/// Pending handle completion, carried out after the post-task hook has run.
pub(crate) enum Delivery {
    /// Store the produced value.
    Value(ValueCallback),
    /// Store a failure.
    Failure(FailureCallback),
}

impl Delivery {
    /// Complete the handle; a `Failure` delivery receives `error`.
    pub(crate) fn deliver(self, error: Option<PoolError>) {
        match (self, error) {
            (Self::Value(complete), _) => complete(),
            (Self::Failure(on_failure), Some(error)) => on_failure(error),
            // Dropping the callback cancels the handle.
            (Self::Failure(_), None) => {}
        }
    }
}

/// An admitted-but-not-finished unit of work.
///
/// Tasks are created by the pool; callers only meet them when a rejection
/// policy inspects one or when `shutdown_now` hands back queued work.
pub struct Task {
    id: TaskId,
    mode: SubmissionMode,
    body: TaskBody,
    on_failure: Option<FailureCallback>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Run a body, turning both `Err` returns and panics into a [`TaskFailure`].
fn run_guarded<T>(body: impl FnOnce() -> AppResult<T>) -> Result<T, TaskFailure> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(TaskFailure::Error(error)),
        Err(payload) => Err(TaskFailure::from_panic(payload)),
    }
}

impl Task {
    pub(crate) fn fire_and_forget<F>(id: TaskId, body: F) -> Self
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        Self {
            id,
            mode: SubmissionMode::FireAndForget,
            body: Box::new(move || run_guarded(body).map(|()| None::<ValueCallback>)),
            on_failure: None,
        }
    }

    pub(crate) fn result_tracked<F, T>(id: TaskId, body: F) -> (Self, ResultHandle<T>)
    where
        F: FnOnce() -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (completer, handle) = result_slot(id);
        // Shared so the handle is cancelled only when both halves are gone.
        let completer = Arc::new(completer);
        let on_success = Arc::clone(&completer);
        let task = Self {
            id,
            mode: SubmissionMode::ResultTracked,
            body: Box::new(move || -> Result<Option<ValueCallback>, TaskFailure> {
                let value = run_guarded(body)?;
                let complete: ValueCallback = Box::new(move || {
                    on_success.complete(Ok(value));
                });
                Ok(Some(complete))
            }),
            on_failure: Some(Box::new(move |error: PoolError| {
                completer.complete(Err(error));
            })),
        };
        (task, handle)
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Submission mode.
    #[must_use]
    pub const fn mode(&self) -> SubmissionMode {
        self.mode
    }

    /// Run the body and package the result for the post-task hook.
    ///
    /// The handle of a result-tracked task is not touched here; the returned
    /// [`Delivery`] completes it once the hook has seen the record.
    pub(crate) fn execute(self, worker: &str) -> (ExecutionRecord, Option<Delivery>) {
        let (outcome, delivery) = match (self.body)() {
            Ok(complete) => (TaskOutcome::Success, complete.map(Delivery::Value)),
            Err(failure) => (
                TaskOutcome::Failure(failure),
                self.on_failure.map(Delivery::Failure),
            ),
        };
        let record = ExecutionRecord {
            task_id: self.id,
            mode: self.mode,
            worker: worker.to_owned(),
            outcome,
        };
        (record, delivery)
    }

    /// Complete a result-tracked task's handle with `error` without running it.
    pub(crate) fn reject(self, error: PoolError) {
        if let Some(on_failure) = self.on_failure {
            on_failure(error);
        }
    }

    /// Run a task handed back by `shutdown_now` on the current thread.
    ///
    /// A result-tracked task delivers its outcome to its handle and returns
    /// `None`; a fire-and-forget task returns its failure, if any.
    pub fn run(self) -> Option<TaskFailure> {
        let (record, delivery) = self.execute("caller");
        match (record.outcome, delivery) {
            (TaskOutcome::Success, delivery) => {
                if let Some(delivery) = delivery {
                    delivery.deliver(None);
                }
                None
            }
            (TaskOutcome::Failure(failure), Some(delivery)) => {
                delivery.deliver(Some(PoolError::TaskFailed(failure)));
                None
            }
            (TaskOutcome::Failure(failure), None) => Some(failure),
        }
    }
}
