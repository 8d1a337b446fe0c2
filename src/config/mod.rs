//! Configuration models for pools and their collaborators.

pub mod pool;

pub use pool::{SchedulerConfig, WorkerPoolConfig, ENV_PREFIX};
