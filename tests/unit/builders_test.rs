//! Tests for builder modules

use prometheus_elastic_pool::builders::{build_pools, WorkerPoolBuilder};
use prometheus_elastic_pool::config::{SchedulerConfig, WorkerPoolConfig};
use prometheus_elastic_pool::core::{PoolError, RunState, WorkerPool};
use std::collections::HashMap;
use std::time::Duration;

fn config(core: usize, max: usize) -> WorkerPoolConfig {
    WorkerPoolConfig::new()
        .with_core_size(core)
        .with_max_size(max)
        .with_queue_capacity(4)
}

#[test]
fn test_builder_starts_no_workers() {
    let pool = WorkerPoolBuilder::new(config(2, 4)).build().unwrap();
    let stats = pool.stats();
    assert_eq!(stats.metrics.pool_size, 0);
    assert_eq!(stats.core_size, 2);
    assert_eq!(stats.max_size, 4);
    assert_eq!(stats.queue_capacity, 4);
    assert_eq!(stats.run_state, RunState::Running);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let err = WorkerPool::new(config(3, 2)).unwrap_err();
    assert!(matches!(err, PoolError::InvalidConfig(_)));
    assert!(err.to_string().contains("core_size (3)"));
}

#[test]
fn test_pools_get_distinct_ids() {
    let a = WorkerPool::new(config(1, 1)).unwrap();
    let b = WorkerPool::new(config(1, 1)).unwrap();
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_build_pools_from_scheduler_config() {
    let mut pools = HashMap::new();
    pools.insert("fast".to_string(), config(1, 2));
    pools.insert("slow".to_string(), config(0, 1));
    let built = build_pools(&SchedulerConfig { pools }).unwrap();
    assert_eq!(built.len(), 2);

    let handle = built["fast"].submit(|| Ok("fast"));
    assert_eq!(handle.wait_timeout(Duration::from_secs(5)).unwrap(), "fast");
    let handle = built["slow"].submit(|| Ok("slow"));
    assert_eq!(handle.wait_timeout(Duration::from_secs(5)).unwrap(), "slow");

    for pool in built.values() {
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
    }
}

#[test]
fn test_build_pools_rejects_invalid_pool() {
    let mut pools = HashMap::new();
    pools.insert("bad".to_string(), config(1, 1).with_queue_capacity(0));
    let err = build_pools(&SchedulerConfig { pools }).unwrap_err();
    assert!(err.to_string().contains("pool `bad` invalid"), "{err}");
}
