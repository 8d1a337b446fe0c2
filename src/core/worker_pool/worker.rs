//! Worker threads and the factory that creates them.

use std::io;
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::core::task::Task;

use super::state::Shared;

/// Body a [`ThreadFactory`] must run on the new thread.
pub type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// Creates the OS threads workers run on.
///
/// An `Err` is treated as a worker-creation failure: it is reported to the
/// exception observer and the pool carries on with the workers it has.
pub trait ThreadFactory: Send + Sync {
    /// Start a thread running `body`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread could not be created.
    fn spawn(&self, worker_id: usize, body: WorkerBody) -> io::Result<()>;
}

/// Default factory: named threads built with [`std::thread::Builder`].
#[derive(Debug, Clone)]
pub struct NamedThreadFactory {
    name_prefix: String,
    stack_size: Option<usize>,
}

impl NamedThreadFactory {
    /// Threads are named `{prefix}-{worker_id}`.
    #[must_use]
    pub fn new(name_prefix: impl Into<String>, stack_size: Option<usize>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            stack_size,
        }
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn spawn(&self, worker_id: usize, body: WorkerBody) -> io::Result<()> {
        let mut builder = thread::Builder::new().name(format!("{}-{worker_id}", self.name_prefix));
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        // Workers are detached; termination is observed through the pool state.
        builder.spawn(body).map(drop)
    }
}

/// Why a worker thread stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum WorkerExit {
    /// Overflow worker idle for longer than the keep-alive.
    IdleTimeout,
    /// Pool shut down and the queue is empty.
    Drained,
    /// `shutdown_now` was called.
    Stopped,
}

/// Worker loop: run the first task, then pull from the queue until told to exit.
pub(crate) fn run_worker(shared: &Arc<Shared>, worker_id: usize, first: Option<Task>) {
    let name = thread::current()
        .name()
        .map_or_else(|| format!("worker-{worker_id}"), str::to_owned);
    debug!(pool_id = %shared.id, worker_id, "worker thread started");

    if first.is_some() {
        shared.mark_active();
    }
    let mut next = first;
    let mut finished_task = false;
    let exit = loop {
        let task = match next.take() {
            Some(task) => task,
            None => match shared.take_task(finished_task) {
                Ok(task) => task,
                Err(exit) => break exit,
            },
        };
        shared.run_task(task, &name);
        finished_task = true;
    };

    debug!(pool_id = %shared.id, worker_id, reason = ?exit, "worker thread exiting");
}
