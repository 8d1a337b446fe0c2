//! Tests for configuration validation

use prometheus_elastic_pool::config::{SchedulerConfig, WorkerPoolConfig};
use prometheus_elastic_pool::core::Rejection;
use std::time::Duration;

fn valid() -> WorkerPoolConfig {
    WorkerPoolConfig::new()
        .with_core_size(2)
        .with_max_size(5)
        .with_queue_capacity(10)
}

#[test]
fn test_pool_config_validation() {
    assert!(valid().validate().is_ok());
    // core_size of zero is allowed: every worker is an overflow worker.
    assert!(valid().with_core_size(0).validate().is_ok());
}

#[test]
fn test_pool_config_invalid_max_size() {
    let err = valid().with_core_size(0).with_max_size(0).validate().unwrap_err();
    assert!(err.contains("max_size"), "{err}");
}

#[test]
fn test_pool_config_core_exceeds_max() {
    let err = valid().with_core_size(6).validate().unwrap_err();
    assert_eq!(err, "core_size (6) must not exceed max_size (5)");
}

#[test]
fn test_pool_config_invalid_queue_capacity() {
    let err = valid().with_queue_capacity(0).validate().unwrap_err();
    assert!(err.contains("queue_capacity"), "{err}");
}

#[test]
fn test_pool_config_invalid_thread_settings() {
    assert!(valid().with_thread_name_prefix("  ").validate().is_err());
    assert!(valid().with_thread_stack_size(1024).validate().is_err());
    assert!(valid().with_thread_stack_size(2 * 1024 * 1024).validate().is_ok());
}

#[test]
fn test_pool_config_from_json_with_defaults() {
    let cfg = WorkerPoolConfig::from_json_str(
        r#"{ "core_size": 1, "max_size": 3, "queue_capacity": 4, "rejection": "discard_oldest" }"#,
    )
    .unwrap();
    assert_eq!(cfg.core_size, 1);
    assert_eq!(cfg.max_size, 3);
    assert_eq!(cfg.queue_capacity, 4);
    assert_eq!(cfg.rejection, Rejection::DiscardOldest);
    assert_eq!(cfg.keep_alive(), Duration::from_secs(60));
    assert_eq!(cfg.thread_name_prefix, "elastic-worker");
}

#[test]
fn test_pool_config_from_json_rejects_invalid() {
    let err = WorkerPoolConfig::from_json_str(r#"{ "core_size": 4, "max_size": 2 }"#).unwrap_err();
    assert!(err.contains("core_size"), "{err}");

    let err = WorkerPoolConfig::from_json_str(r#"{ "rejection": "explode" }"#).unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}

#[test]
fn test_scheduler_config_parse_and_validate() {
    let json = r#"
    {
        "pools": {
            "embeddings": { "core_size": 1, "max_size": 2, "queue_capacity": 8 },
            "audit": { "core_size": 0, "max_size": 1, "queue_capacity": 64, "rejection": "caller_runs" }
        }
    }
    "#;
    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.pools.len(), 2);
    assert_eq!(cfg.pools["audit"].rejection, Rejection::CallerRuns);
}

#[test]
fn test_scheduler_config_requires_a_pool() {
    let err = SchedulerConfig::from_json_str(r#"{ "pools": {} }"#).unwrap_err();
    assert_eq!(err, "at least one pool must be defined");
}

#[test]
fn test_scheduler_config_names_invalid_pool() {
    let json = r#"{ "pools": { "broken": { "core_size": 1, "max_size": 1, "queue_capacity": 0 } } }"#;
    let err = SchedulerConfig::from_json_str(json).unwrap_err();
    assert!(err.starts_with("pool `broken` invalid:"), "{err}");
}

#[test]
fn test_rejection_parsing() {
    assert_eq!("Abort".parse::<Rejection>().unwrap(), Rejection::Abort);
    assert_eq!(" caller_runs ".parse::<Rejection>().unwrap(), Rejection::CallerRuns);
    assert_eq!("discard".parse::<Rejection>().unwrap(), Rejection::DiscardNewest);
    assert!("retry".parse::<Rejection>().is_err());
    assert_eq!(Rejection::DiscardOldest.to_string(), "discard_oldest");
}
