//! Shared pool state and the admission algorithm.
//!
//! `PoolState` (worker counts, run state and the task queue) sits behind one
//! mutex. Admission, worker retirement and shutdown transitions all mutate it
//! under that lock, which keeps `active <= workers <= max_size` and
//! `queue.len() <= queue_capacity` true at every release. Worker threads are
//! spawned while the lock is held so a decision and its effect are one step.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::PoolError;
use crate::core::observer::{ExceptionObserver, MonitoringHook};
use crate::core::queue::TaskQueue;
use crate::core::rejection::{Rejection, RejectionPolicy};
use crate::core::task::{Task, TaskOutcome};

use super::worker::{run_worker, ThreadFactory, WorkerExit};
use super::{AdmissionOutcome, PoolCounters, PoolMetricsSnapshot, PoolStats, RunState};

/// Everything guarded by the pool lock.
#[derive(Debug)]
pub(crate) struct PoolState {
    pub run_state: RunState,
    pub worker_count: usize,
    pub active_count: usize,
    pub largest_pool_size: usize,
    pub next_worker_id: usize,
    pub queue: TaskQueue,
}

impl PoolState {
    fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            pool_size: self.worker_count,
            active_count: self.active_count,
            queue_size: self.queue.len(),
        }
    }

    fn check_invariants(&self, max_size: usize) {
        debug_assert!(self.active_count <= self.worker_count, "active > workers: {self:?}");
        debug_assert!(self.worker_count <= max_size, "workers > max_size: {self:?}");
        debug_assert!(self.queue.len() <= self.queue.capacity(), "queue over capacity");
    }
}

/// Immutable sizing taken from the validated configuration.
#[derive(Debug, Clone)]
pub(crate) struct Sizing {
    pub core_size: usize,
    pub max_size: usize,
    pub keep_alive: Duration,
    pub queue_capacity: usize,
}

/// Result of one admission attempt under the lock.
enum Admission {
    Accepted,
    Shutdown(Task),
    Saturated(Task, PoolMetricsSnapshot),
}

/// A thread factory error, reported once the lock is released.
struct SpawnFailure {
    worker_id: usize,
    error: io::Error,
    snapshot: PoolMetricsSnapshot,
}

/// State shared by the dispatcher and every worker thread.
pub(crate) struct Shared {
    pub id: Uuid,
    pub sizing: Sizing,
    state: Mutex<PoolState>,
    work_available: Condvar,
    terminated: Condvar,
    policy: Arc<dyn RejectionPolicy>,
    factory: Arc<dyn ThreadFactory>,
    hook: MonitoringHook,
    counters: PoolCounters,
    next_task_id: AtomicU64,
}

impl Shared {
    pub(crate) fn new(
        sizing: Sizing,
        policy: Arc<dyn RejectionPolicy>,
        factory: Arc<dyn ThreadFactory>,
        hook: MonitoringHook,
    ) -> Self {
        let queue = TaskQueue::new(sizing.queue_capacity);
        Self {
            id: Uuid::new_v4(),
            sizing,
            state: Mutex::new(PoolState {
                run_state: RunState::Running,
                worker_count: 0,
                active_count: 0,
                largest_pool_size: 0,
                next_worker_id: 0,
                queue,
            }),
            work_available: Condvar::new(),
            terminated: Condvar::new(),
            policy,
            factory,
            hook,
            counters: PoolCounters::default(),
            next_task_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn next_task_id(&self) -> u64 {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) const fn observer(&self) -> &Arc<ExceptionObserver> {
        self.hook.observer()
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    /// Admit a task, applying the rejection policy if the pool is saturated.
    pub(crate) fn dispatch(self: &Arc<Self>, task: Task) -> AdmissionOutcome {
        let mut failures = Vec::new();
        let admission = {
            let mut state = self.state.lock();
            self.admit_locked(&mut state, task, &mut failures)
        };
        self.report_spawn_failures(failures);

        match admission {
            Admission::Accepted => AdmissionOutcome::Admitted,
            Admission::Shutdown(task) => self.reject_shutdown(task),
            Admission::Saturated(task, snapshot) => self.saturated(task, snapshot),
        }
    }

    /// Steps 1-4 of the admission algorithm. Must be called with the lock held.
    fn admit_locked(
        self: &Arc<Self>,
        state: &mut PoolState,
        task: Task,
        failures: &mut Vec<SpawnFailure>,
    ) -> Admission {
        if state.run_state != RunState::Running {
            return Admission::Shutdown(task);
        }
        let mut task = task;

        if state.worker_count < self.sizing.core_size {
            match self.add_worker(state, Some(task)) {
                Ok(()) => return self.accepted(state),
                Err((failure, first)) => {
                    failures.push(failure);
                    match first {
                        Some(first) => task = first,
                        None => return self.accepted(state),
                    }
                }
            }
        }

        match state.queue.try_enqueue(task) {
            Ok(()) => {
                self.work_available.notify_one();
                // Nobody would pick the task up otherwise.
                if state.worker_count == 0 {
                    if let Err((failure, _)) = self.add_worker(state, None) {
                        failures.push(failure);
                    }
                }
                return self.accepted(state);
            }
            Err(returned) => task = returned,
        }

        if state.worker_count < self.sizing.max_size {
            match self.add_worker(state, Some(task)) {
                Ok(()) => return self.accepted(state),
                Err((failure, first)) => {
                    failures.push(failure);
                    match first {
                        Some(first) => task = first,
                        None => return self.accepted(state),
                    }
                }
            }
        }

        Admission::Saturated(task, state.snapshot())
    }

    fn accepted(&self, state: &PoolState) -> Admission {
        state.check_invariants(self.sizing.max_size);
        PoolCounters::bump(&self.counters.submitted);
        Admission::Accepted
    }

    /// Start a worker, optionally bound to its first task.
    ///
    /// On failure the first task is handed back so admission can fall through.
    fn add_worker(
        self: &Arc<Self>,
        state: &mut PoolState,
        first: Option<Task>,
    ) -> Result<(), (SpawnFailure, Option<Task>)> {
        let worker_id = state.next_worker_id;
        state.next_worker_id += 1;
        state.worker_count += 1;

        // The factory consumes the body even when spawning fails; the slot lets
        // us recover the task in that case.
        let slot = Arc::new(Mutex::new(first));
        let body = {
            let shared = Arc::clone(self);
            let slot = Arc::clone(&slot);
            Box::new(move || {
                let first = slot.lock().take();
                run_worker(&shared, worker_id, first);
            })
        };

        match self.factory.spawn(worker_id, body) {
            Ok(()) => {
                state.largest_pool_size = state.largest_pool_size.max(state.worker_count);
                debug!(pool_id = %self.id, worker_id, pool_size = state.worker_count, "worker started");
                Ok(())
            }
            Err(error) => {
                state.worker_count -= 1;
                let failure = SpawnFailure {
                    worker_id,
                    error,
                    snapshot: state.snapshot(),
                };
                let first = slot.lock().take();
                Err((failure, first))
            }
        }
    }

    fn report_spawn_failures(&self, failures: Vec<SpawnFailure>) {
        for failure in failures {
            self.observer()
                .worker_creation_failed(failure.worker_id, &failure.error, failure.snapshot);
        }
    }

    fn reject_shutdown(&self, task: Task) -> AdmissionOutcome {
        PoolCounters::bump(&self.counters.rejected);
        debug!(pool_id = %self.id, task_id = task.id(), "task rejected: pool is shutting down");
        task.reject(PoolError::ShutdownRejected);
        AdmissionOutcome::Rejected(PoolError::ShutdownRejected)
    }

    fn abort(&self, task: Task, snapshot: PoolMetricsSnapshot) -> AdmissionOutcome {
        PoolCounters::bump(&self.counters.rejected);
        warn!(
            pool_id = %self.id,
            task_id = task.id(),
            pool_size = snapshot.pool_size,
            queued = snapshot.queue_size,
            "task rejected: queue full and pool at max size"
        );
        task.reject(PoolError::AdmissionRejected { snapshot });
        AdmissionOutcome::Rejected(PoolError::AdmissionRejected { snapshot })
    }

    fn discard(&self, task: Task) {
        PoolCounters::bump(&self.counters.discarded);
        self.observer().task_discarded(task.id(), task.mode());
        task.reject(PoolError::Discarded);
    }

    /// Carry out the rejection policy's decision. Runs without the lock.
    fn saturated(self: &Arc<Self>, task: Task, snapshot: PoolMetricsSnapshot) -> AdmissionOutcome {
        match self.policy.on_rejected(&task, &snapshot) {
            Rejection::Abort => self.abort(task, snapshot),
            Rejection::DiscardNewest => {
                self.discard(task);
                AdmissionOutcome::Discarded
            }
            Rejection::DiscardOldest => self.discard_oldest_and_retry(task),
            Rejection::CallerRuns => {
                let caller = std::thread::current()
                    .name()
                    .map_or_else(|| "caller".to_owned(), str::to_owned);
                debug!(pool_id = %self.id, task_id = task.id(), "pool saturated; running task on caller");
                self.run_task(task, &caller);
                AdmissionOutcome::RanOnCaller
            }
        }
    }

    fn discard_oldest_and_retry(self: &Arc<Self>, task: Task) -> AdmissionOutcome {
        let mut failures = Vec::new();
        let (evicted, admission) = {
            let mut state = self.state.lock();
            let evicted = if state.run_state == RunState::Running && state.queue.is_full() {
                state.queue.dequeue()
            } else {
                None
            };
            let admission = self.admit_locked(&mut state, task, &mut failures);
            (evicted, admission)
        };
        self.report_spawn_failures(failures);
        if let Some(evicted) = evicted {
            self.discard(evicted);
        }

        match admission {
            Admission::Accepted => AdmissionOutcome::Admitted,
            Admission::Shutdown(task) => self.reject_shutdown(task),
            Admission::Saturated(task, snapshot) => self.abort(task, snapshot),
        }
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Run a task and feed its record through the post-task hook.
    pub(crate) fn run_task(&self, task: Task, worker: &str) {
        let (record, delivery) = task.execute(worker);
        PoolCounters::bump(&self.counters.completed);
        if matches!(record.outcome, TaskOutcome::Failure(_)) {
            PoolCounters::bump(&self.counters.failed);
        }
        let snapshot = self.snapshot();
        self.hook.after_execute(record, delivery, &snapshot);
    }

    /// Count a worker as busy with the task it was started with.
    pub(crate) fn mark_active(&self) {
        let mut state = self.state.lock();
        state.active_count += 1;
        state.check_invariants(self.sizing.max_size);
    }

    /// Block until a queued task is available or the worker should exit.
    ///
    /// `finished_task` releases the caller's active slot first. When this
    /// returns `Err`, the worker has already been removed from the count.
    pub(crate) fn take_task(&self, finished_task: bool) -> Result<Task, WorkerExit> {
        let mut state = self.state.lock();
        if finished_task {
            state.active_count -= 1;
        }
        let mut timed_out = false;
        loop {
            let exit = match state.run_state {
                RunState::Stopping | RunState::Terminated => Some(WorkerExit::Stopped),
                RunState::ShuttingDown if state.queue.is_empty() => Some(WorkerExit::Drained),
                _ => None,
            };
            if let Some(exit) = exit {
                self.retire(&mut state);
                return Err(exit);
            }

            if let Some(task) = state.queue.dequeue() {
                state.active_count += 1;
                state.check_invariants(self.sizing.max_size);
                return Ok(task);
            }

            let overflow = state.worker_count > self.sizing.core_size;
            if overflow && timed_out {
                self.retire(&mut state);
                return Err(WorkerExit::IdleTimeout);
            }
            if overflow {
                timed_out = self
                    .work_available
                    .wait_for(&mut state, self.sizing.keep_alive)
                    .timed_out();
            } else {
                self.work_available.wait(&mut state);
            }
        }
    }

    fn retire(&self, state: &mut PoolState) {
        state.worker_count -= 1;
        state.check_invariants(self.sizing.max_size);
        self.try_terminate(state);
    }

    fn try_terminate(&self, state: &mut PoolState) {
        let stopping = matches!(state.run_state, RunState::ShuttingDown | RunState::Stopping);
        if stopping && state.worker_count == 0 && state.queue.is_empty() {
            state.run_state = RunState::Terminated;
            self.terminated.notify_all();
            info!(pool_id = %self.id, largest_pool_size = state.largest_pool_size, "worker pool terminated");
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub(crate) fn prestart_core_workers(self: &Arc<Self>) -> usize {
        let mut failures = Vec::new();
        let mut started = 0;
        {
            let mut state = self.state.lock();
            while state.run_state == RunState::Running && state.worker_count < self.sizing.core_size {
                match self.add_worker(&mut state, None) {
                    Ok(()) => started += 1,
                    Err((failure, _)) => {
                        failures.push(failure);
                        break;
                    }
                }
            }
        }
        self.report_spawn_failures(failures);
        started
    }

    pub(crate) fn shutdown(self: &Arc<Self>) {
        let mut failures = Vec::new();
        {
            let mut state = self.state.lock();
            if state.run_state == RunState::Running {
                state.run_state = RunState::ShuttingDown;
                info!(
                    pool_id = %self.id,
                    pool_size = state.worker_count,
                    queued = state.queue.len(),
                    "shutting down worker pool"
                );
                // Queued work needs at least one worker to drain.
                if state.worker_count == 0 && !state.queue.is_empty() {
                    if let Err((failure, _)) = self.add_worker(&mut state, None) {
                        failures.push(failure);
                    }
                }
            }
            self.work_available.notify_all();
            self.try_terminate(&mut state);
        }
        self.report_spawn_failures(failures);
    }

    pub(crate) fn shutdown_now(&self) -> Vec<Task> {
        let mut state = self.state.lock();
        if state.run_state < RunState::Stopping {
            state.run_state = RunState::Stopping;
        }
        let drained = state.queue.drain();
        info!(
            pool_id = %self.id,
            pool_size = state.worker_count,
            drained = drained.len(),
            "stopping worker pool"
        );
        self.work_available.notify_all();
        self.try_terminate(&mut state);
        drained
    }

    pub(crate) fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.run_state != RunState::Terminated {
            if self.terminated.wait_until(&mut state, deadline).timed_out() {
                return state.run_state == RunState::Terminated;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    pub(crate) fn run_state(&self) -> RunState {
        self.state.lock().run_state
    }

    pub(crate) fn snapshot(&self) -> PoolMetricsSnapshot {
        self.state.lock().snapshot()
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            metrics: state.snapshot(),
            core_size: self.sizing.core_size,
            max_size: self.sizing.max_size,
            queue_capacity: self.sizing.queue_capacity,
            largest_pool_size: state.largest_pool_size,
            submitted_tasks: PoolCounters::get(&self.counters.submitted),
            completed_tasks: PoolCounters::get(&self.counters.completed),
            failed_tasks: PoolCounters::get(&self.counters.failed),
            rejected_tasks: PoolCounters::get(&self.counters.rejected),
            discarded_tasks: PoolCounters::get(&self.counters.discarded),
            run_state: state.run_state,
        }
    }
}
