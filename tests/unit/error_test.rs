//! Tests for error types

use prometheus_elastic_pool::core::{PoolError, PoolMetricsSnapshot, TaskFailure};

#[test]
fn test_admission_rejected_error() {
    let err = PoolError::AdmissionRejected {
        snapshot: PoolMetricsSnapshot {
            pool_size: 5,
            active_count: 5,
            queue_size: 10,
        },
    };
    assert_eq!(
        format!("{err}"),
        "task rejected: queue full and pool at max size (pool_size=5 active=5 queued=10)"
    );
    assert!(err.is_rejection());
}

#[test]
fn test_shutdown_rejected_error() {
    let err = PoolError::ShutdownRejected;
    assert_eq!(format!("{err}"), "task rejected: pool is shutting down");
    assert!(err.is_rejection());
}

#[test]
fn test_task_failed_is_transparent() {
    let err = PoolError::from(TaskFailure::Error(anyhow::anyhow!("bad row")));
    assert_eq!(format!("{err}"), "task failed: bad row");
    assert!(!err.is_rejection());

    let err = PoolError::TaskFailed(TaskFailure::Panicked("index out of bounds".into()));
    assert_eq!(format!("{err}"), "task panicked: index out of bounds");
}

#[test]
fn test_task_failure_keeps_context_chain() {
    let failure = TaskFailure::Error(anyhow::anyhow!("connection reset").context("loading embeddings"));
    assert_eq!(failure.to_string(), "task failed: loading embeddings: connection reset");
    assert!(!failure.is_panic());
}

#[test]
fn test_handle_errors() {
    assert_eq!(format!("{}", PoolError::Discarded), "task discarded by rejection policy");
    assert_eq!(format!("{}", PoolError::Cancelled), "task cancelled before it ran");
    assert_eq!(format!("{}", PoolError::Timeout), "operation timed out");
    assert_eq!(format!("{}", PoolError::ResultTaken), "result already taken from handle");
}

#[test]
fn test_invalid_config_error() {
    let err = PoolError::InvalidConfig("max_size must be greater than 0".into());
    assert_eq!(format!("{err}"), "invalid configuration: max_size must be greater than 0");
}
