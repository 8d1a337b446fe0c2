//! # Prometheus Elastic Pool
//!
//! A bounded, elastic worker pool with two submission modes and uniform
//! observability of task failures.
//!
//! ## Core Problem Solved
//!
//! Background work on the Prometheus AI Platform (embedding refreshes, audit
//! flushes, prompt post-processing) needs a thread pool that:
//!
//! - **Bounds resources**: between `core_size` and `max_size` OS threads plus a
//!   bounded FIFO queue, so bursts produce backpressure instead of unbounded growth
//! - **Decides admission atomically**: worker counts and queue capacity are checked
//!   and mutated in one critical section
//! - **Never loses a failure**: fire-and-forget failures reach the exception
//!   observer; result-tracked failures reach the caller's handle, never both
//!
//! ## Submission Modes
//!
//! ```rust,ignore
//! use prometheus_elastic_pool::config::WorkerPoolConfig;
//! use prometheus_elastic_pool::core::{AdmissionOutcome, FailureEvent, WorkerPool};
//!
//! let pool = WorkerPool::builder(
//!     WorkerPoolConfig::new()
//!         .with_core_size(2)
//!         .with_max_size(5)
//!         .with_queue_capacity(10),
//! )
//! .uncaught_failure_sink(|event: &FailureEvent<'_>| eprintln!("{event:?}"))
//! .build()?;
//!
//! // Fire-and-forget: only the admission decision comes back.
//! let outcome = pool.execute(|| { refresh_cache()?; Ok(()) });
//! assert!(outcome.is_admitted());
//!
//! // Result-tracked: wait or poll on the handle.
//! let handle = pool.submit(|| Ok(expensive_sum()));
//! let total = handle.wait()?;
//!
//! pool.shutdown();
//! pool.await_termination(std::time::Duration::from_secs(5));
//! ```
//!
//! ## Rejection Policies
//!
//! When the queue is full and `max_size` workers are busy, the configured
//! [`core::RejectionPolicy`] decides: `Abort` (default), `DiscardNewest`,
//! `DiscardOldest` or `CallerRuns`.
//!
//! For complete examples, see:
//! - `tests/worker_pool_test.rs` - admission, failure routing and shutdown
//! - `tests/rejection_policy_test.rs` - saturation behaviour

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Admission control, worker management and failure routing.
pub mod core;
/// Configuration models for pools.
pub mod config;
/// Builders to construct pools from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
