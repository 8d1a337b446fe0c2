//! Builders to construct worker pools from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{SchedulerConfig, WorkerPoolConfig};
use crate::core::observer::MonitoringHook;
use crate::core::{
    ExceptionObserver, ExecutionRecord, FailureEvent, NamedThreadFactory, PoolError,
    PoolMetricsSnapshot, PostTaskHook, RejectionPolicy, ThreadFactory, UncaughtFailureSink,
    WorkerPool,
};

/// Assembles a [`WorkerPool`] from a configuration plus the collaborators that
/// cannot be expressed in serialized config.
#[must_use]
pub struct WorkerPoolBuilder {
    config: WorkerPoolConfig,
    rejection_policy: Option<Arc<dyn RejectionPolicy>>,
    thread_factory: Option<Arc<dyn ThreadFactory>>,
    failure_sink: Option<UncaughtFailureSink>,
    post_task_hook: Option<PostTaskHook>,
}

impl std::fmt::Debug for WorkerPoolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPoolBuilder")
            .field("config", &self.config)
            .field("rejection_policy", &self.rejection_policy)
            .field("custom_thread_factory", &self.thread_factory.is_some())
            .field("has_failure_sink", &self.failure_sink.is_some())
            .field("has_post_task_hook", &self.post_task_hook.is_some())
            .finish()
    }
}

impl WorkerPoolBuilder {
    /// Start from a configuration; collaborators default to the config's
    /// rejection policy, a [`NamedThreadFactory`] and log-only failure reporting.
    pub const fn new(config: WorkerPoolConfig) -> Self {
        Self {
            config,
            rejection_policy: None,
            thread_factory: None,
            failure_sink: None,
            post_task_hook: None,
        }
    }

    /// Override the configured rejection policy.
    pub fn rejection_policy(mut self, policy: impl RejectionPolicy + 'static) -> Self {
        self.rejection_policy = Some(Arc::new(policy));
        self
    }

    /// Use a custom thread factory.
    pub fn thread_factory(mut self, factory: impl ThreadFactory + 'static) -> Self {
        self.thread_factory = Some(Arc::new(factory));
        self
    }

    /// Forward failure events to `sink` in addition to logging them.
    pub fn uncaught_failure_sink(
        mut self,
        sink: impl Fn(&FailureEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.failure_sink = Some(Arc::new(sink));
        self
    }

    /// Run `hook` after every task with its record and a metrics snapshot.
    pub fn post_task_hook(
        mut self,
        hook: impl Fn(&ExecutionRecord, &PoolMetricsSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.post_task_hook = Some(Arc::new(hook));
        self
    }

    /// Validate the configuration and build the pool. No worker starts until
    /// the first admission (or `prestart_core_workers`).
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn build(self) -> Result<WorkerPool, PoolError> {
        self.config.validate().map_err(PoolError::InvalidConfig)?;

        let policy = self
            .rejection_policy
            .unwrap_or_else(|| Arc::new(self.config.rejection));
        let factory = self.thread_factory.unwrap_or_else(|| {
            Arc::new(NamedThreadFactory::new(
                self.config.thread_name_prefix.clone(),
                self.config.thread_stack_size,
            ))
        });
        let observer = Arc::new(ExceptionObserver::new(self.failure_sink));
        let hook = MonitoringHook::new(observer, self.post_task_hook);

        Ok(WorkerPool::from_parts(&self.config, policy, factory, hook))
    }
}

/// Build one pool per entry of a scheduler configuration with default collaborators.
///
/// # Errors
///
/// Returns `PoolError::InvalidConfig` if any pool configuration is invalid.
pub fn build_pools(cfg: &SchedulerConfig) -> Result<HashMap<String, WorkerPool>, PoolError> {
    cfg.validate()
        .map_err(|e| PoolError::InvalidConfig(format!("config invalid: {e}")))?;

    let mut pools = HashMap::with_capacity(cfg.pools.len());
    for (name, pool_cfg) in &cfg.pools {
        let pool = WorkerPoolBuilder::new(pool_cfg.clone()).build()?;
        pools.insert(name.clone(), pool);
    }
    Ok(pools)
}
