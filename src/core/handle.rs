//! Result handles for result-tracked tasks.
//!
//! A [`ResultHandle`] is the consumer side of a one-shot slot; the pool keeps the
//! producer side ([`Completer`]) inside the task. The slot moves from `Pending`
//! to a terminal state exactly once. Waiting parks only the calling thread on a
//! `Condvar`; pool workers never block on a handle.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::error::{PoolError, PoolResult};
use super::task::TaskId;

/// Observable state of a result handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// The task has not finished yet.
    Pending,
    /// The task produced a value.
    Completed,
    /// The task failed, was rejected, discarded or cancelled.
    Failed,
}

enum SlotState<T> {
    Pending,
    /// `None` once the value has been taken.
    Completed(Option<T>),
    /// `None` once the error has been taken.
    Failed(Option<PoolError>),
}

impl<T> SlotState<T> {
    const fn observe(&self) -> HandleState {
        match self {
            Self::Pending => HandleState::Pending,
            Self::Completed(_) => HandleState::Completed,
            Self::Failed(_) => HandleState::Failed,
        }
    }

    /// Move the outcome out, leaving the terminal state in place.
    fn take(&mut self) -> Option<PoolResult<T>> {
        match self {
            Self::Pending => None,
            Self::Completed(value) => Some(value.take().ok_or(PoolError::ResultTaken)),
            Self::Failed(error) => Some(Err(error.take().unwrap_or(PoolError::ResultTaken))),
        }
    }
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

/// Handle to the eventual outcome of a task submitted with `submit`.
///
/// Handles are cheap to clone and any number of threads may poll or wait. The
/// outcome itself is moved out once; later takes return
/// [`PoolError::ResultTaken`] while [`state`](Self::state) keeps reporting the
/// terminal state.
pub struct ResultHandle<T> {
    id: TaskId,
    slot: Arc<Slot<T>>,
}

impl<T> Clone for ResultHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<T> ResultHandle<T> {
    /// Identifier of the task this handle tracks.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Poll the current state without blocking.
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.slot.state.lock().observe()
    }

    /// Whether the task reached a terminal state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state() != HandleState::Pending
    }

    /// Take the outcome if the task is done, without blocking.
    #[must_use]
    pub fn try_take(&self) -> Option<PoolResult<T>> {
        self.slot.state.lock().take()
    }

    /// Block the calling thread until the task reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns the task's failure, the admission error that prevented it from
    /// running, or [`PoolError::ResultTaken`] if another caller already took it.
    pub fn wait(&self) -> PoolResult<T> {
        let mut state = self.slot.state.lock();
        loop {
            if let Some(outcome) = state.take() {
                return outcome;
            }
            self.slot.ready.wait(&mut state);
        }
    }

    /// Block for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`wait`](Self::wait), plus [`PoolError::Timeout`] when the task
    /// is still pending once the timeout elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> PoolResult<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        loop {
            if let Some(outcome) = state.take() {
                return outcome;
            }
            if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                return state.take().unwrap_or(Err(PoolError::Timeout));
            }
        }
    }
}

#[cfg(feature = "tokio-runtime")]
impl<T: Send + 'static> ResultHandle<T> {
    /// Wait from async code; the blocking wait runs on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`wait`](Self::wait). A blocking task that cannot be joined maps
    /// to [`PoolError::Cancelled`].
    pub async fn wait_async(&self) -> PoolResult<T> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.wait())
            .await
            .unwrap_or(Err(PoolError::Cancelled))
    }
}

/// Producer side of a result slot.
///
/// Dropping the last reference to a completer that never completed marks the
/// handle as [`PoolError::Cancelled`].
pub(crate) struct Completer<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Completer<T> {
    /// Store the outcome and wake waiters. Returns false if already terminal.
    pub(crate) fn complete(&self, outcome: PoolResult<T>) -> bool {
        let mut state = self.slot.state.lock();
        if !matches!(*state, SlotState::Pending) {
            return false;
        }
        *state = match outcome {
            Ok(value) => SlotState::Completed(Some(value)),
            Err(error) => SlotState::Failed(Some(error)),
        };
        self.slot.ready.notify_all();
        true
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.complete(Err(PoolError::Cancelled));
    }
}

/// Create a linked completer/handle pair in the `Pending` state.
pub(crate) fn result_slot<T>(id: TaskId) -> (Completer<T>, ResultHandle<T>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Pending),
        ready: Condvar::new(),
    });
    (
        Completer {
            slot: Arc::clone(&slot),
        },
        ResultHandle { id, slot },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_completes_exactly_once() {
        let (completer, handle) = result_slot::<u32>(7);
        assert_eq!(handle.state(), HandleState::Pending);
        assert!(handle.try_take().is_none());

        assert!(completer.complete(Ok(1)));
        assert!(!completer.complete(Ok(2)));
        assert!(!completer.complete(Err(PoolError::Timeout)));

        assert_eq!(handle.state(), HandleState::Completed);
        assert_eq!(handle.wait().unwrap(), 1);
    }

    #[test]
    fn test_value_taken_once_state_stays_terminal() {
        let (completer, handle) = result_slot::<String>(1);
        let other = handle.clone();
        completer.complete(Ok("done".into()));

        assert_eq!(handle.wait().unwrap(), "done");
        assert!(matches!(other.wait(), Err(PoolError::ResultTaken)));
        assert_eq!(other.state(), HandleState::Completed);
        assert!(other.is_done());
    }

    #[test]
    fn test_failed_state_carries_error() {
        let (completer, handle) = result_slot::<()>(2);
        completer.complete(Err(PoolError::ShutdownRejected));
        assert_eq!(handle.state(), HandleState::Failed);
        assert!(matches!(handle.try_take(), Some(Err(PoolError::ShutdownRejected))));
        assert!(matches!(handle.try_take(), Some(Err(PoolError::ResultTaken))));
    }

    #[test]
    fn test_dropped_completer_cancels() {
        let (completer, handle) = result_slot::<u8>(3);
        drop(completer);
        assert!(matches!(handle.wait(), Err(PoolError::Cancelled)));
    }

    #[test]
    fn test_wait_timeout_expires() {
        let (_completer, handle) = result_slot::<u8>(4);
        let start = Instant::now();
        let result = handle.wait_timeout(Duration::from_millis(30));
        assert!(matches!(result, Err(PoolError::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(handle.state(), HandleState::Pending);
    }

    #[test]
    fn test_wait_wakes_on_completion_from_other_thread() {
        let (completer, handle) = result_slot::<u64>(5);
        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.wait_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        completer.complete(Ok(99));
        assert_eq!(waiter.join().unwrap().unwrap(), 99);
    }
}
