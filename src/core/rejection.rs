//! Saturation policies invoked when a task cannot be admitted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::task::Task;
use super::worker_pool::PoolMetricsSnapshot;

/// Action the pool takes for a task it cannot admit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Refuse the task with `AdmissionRejected`.
    #[default]
    Abort,
    /// Drop the new task and report it as discarded.
    DiscardNewest,
    /// Evict the oldest queued task and retry admission for the new one.
    DiscardOldest,
    /// Run the task synchronously on the submitting thread.
    CallerRuns,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Abort => "abort",
            Self::DiscardNewest => "discard_newest",
            Self::DiscardOldest => "discard_oldest",
            Self::CallerRuns => "caller_runs",
        };
        f.write_str(name)
    }
}

impl FromStr for Rejection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "discard_newest" | "discard" => Ok(Self::DiscardNewest),
            "discard_oldest" => Ok(Self::DiscardOldest),
            "caller_runs" => Ok(Self::CallerRuns),
            other => Err(format!("unknown rejection policy `{other}`")),
        }
    }
}

/// Strategy consulted when the queue is full and the pool runs `max_size` workers.
///
/// Called outside the pool lock. Implementations must not block; the pool
/// carries out the returned action.
pub trait RejectionPolicy: Send + Sync + fmt::Debug {
    /// Decide what to do with `task` given the pool's current metrics.
    fn on_rejected(&self, task: &Task, snapshot: &PoolMetricsSnapshot) -> Rejection;
}

/// A [`Rejection`] is a fixed policy that always returns itself.
impl RejectionPolicy for Rejection {
    fn on_rejected(&self, _task: &Task, _snapshot: &PoolMetricsSnapshot) -> Rejection {
        *self
    }
}
