//! Worker pool and scheduler configuration structures.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::Rejection;

/// Environment variable prefix read by [`WorkerPoolConfig::from_env`].
pub const ENV_PREFIX: &str = "ELASTIC_POOL";

/// Smallest accepted worker stack size.
const MIN_STACK_SIZE: usize = 16 * 1024;

/// Sizing and policy for one worker pool. Immutable once the pool is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Workers kept alive even when idle.
    pub core_size: usize,
    /// Hard ceiling on worker count.
    pub max_size: usize,
    /// Idle time after which an overflow worker retires, in milliseconds.
    pub keep_alive_ms: u64,
    /// Maximum number of queued tasks.
    pub queue_capacity: usize,
    /// Policy applied when the queue is full and the pool is at `max_size`.
    pub rejection: Rejection,
    /// Worker threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
    /// Worker thread stack size in bytes; platform default when unset.
    pub thread_stack_size: Option<usize>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            core_size: cpus,
            max_size: cpus * 2,
            keep_alive_ms: 60_000,
            queue_capacity: 256,
            rejection: Rejection::Abort,
            thread_name_prefix: "elastic-worker".into(),
            thread_stack_size: None,
        }
    }
}

impl WorkerPoolConfig {
    /// Defaults sized from the number of CPUs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the core size.
    #[must_use]
    pub const fn with_core_size(mut self, core_size: usize) -> Self {
        self.core_size = core_size;
        self
    }

    /// Set the max size.
    #[must_use]
    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the keep-alive for overflow workers.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive_ms = u64::try_from(keep_alive.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the rejection policy.
    #[must_use]
    pub const fn with_rejection(mut self, rejection: Rejection) -> Self {
        self.rejection = rejection;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, stack_size: usize) -> Self {
        self.thread_stack_size = Some(stack_size);
        self
    }

    /// Keep-alive as a `Duration`.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Validate sizing values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("max_size must be greater than 0".into());
        }
        if self.core_size > self.max_size {
            return Err(format!(
                "core_size ({}) must not exceed max_size ({})",
                self.core_size, self.max_size
            ));
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        if let Some(stack_size) = self.thread_stack_size {
            if stack_size < MIN_STACK_SIZE {
                return Err(format!("thread_stack_size must be at least {MIN_STACK_SIZE} bytes"));
            }
        }
        Ok(())
    }

    /// Parse a pool configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `.env` if present, then read `ELASTIC_POOL_*` variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or the
    /// validation error.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Read `{prefix}_CORE_SIZE`, `{prefix}_MAX_SIZE`, `{prefix}_KEEP_ALIVE_MS`,
    /// `{prefix}_QUEUE_CAPACITY`, `{prefix}_REJECTION`,
    /// `{prefix}_THREAD_NAME_PREFIX` and `{prefix}_THREAD_STACK_SIZE`.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Some(v) = env_parse(prefix, "CORE_SIZE")? {
            cfg.core_size = v;
        }
        if let Some(v) = env_parse(prefix, "MAX_SIZE")? {
            cfg.max_size = v;
        }
        if let Some(v) = env_parse(prefix, "KEEP_ALIVE_MS")? {
            cfg.keep_alive_ms = v;
        }
        if let Some(v) = env_parse(prefix, "QUEUE_CAPACITY")? {
            cfg.queue_capacity = v;
        }
        if let Some(v) = env_parse(prefix, "REJECTION")? {
            cfg.rejection = v;
        }
        if let Some(v) = env_parse(prefix, "THREAD_NAME_PREFIX")? {
            cfg.thread_name_prefix = v;
        }
        if let Some(v) = env_parse(prefix, "THREAD_STACK_SIZE")? {
            cfg.thread_stack_size = Some(v);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_parse<T>(prefix: &str, key: &str) -> Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let name = format!("{prefix}_{key}");
    match env::var(&name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}: {e}")),
        Err(_) => Ok(None),
    }
}

/// Root configuration for several named pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Map of pool name to configuration.
    pub pools: HashMap<String, WorkerPoolConfig>,
}

impl SchedulerConfig {
    /// Validate all pools and ensure at least one pool exists.
    ///
    /// # Errors
    ///
    /// Returns the first invalid pool and its problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.pools.is_empty() {
            return Err("at least one pool must be defined".into());
        }
        for (name, pool) in &self.pools {
            pool.validate()
                .map_err(|e| format!("pool `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = WorkerPoolConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.core_size >= 1);
        assert_eq!(cfg.max_size, cfg.core_size * 2);
        assert_eq!(cfg.keep_alive(), Duration::from_secs(60));
    }

    #[test]
    fn test_keep_alive_round_trips_through_millis() {
        let cfg = WorkerPoolConfig::new().with_keep_alive(Duration::from_millis(1500));
        assert_eq!(cfg.keep_alive_ms, 1500);
        assert_eq!(cfg.keep_alive(), Duration::from_millis(1500));
    }

    #[test]
    fn test_env_overrides() {
        let prefix = "POOL_CFG_UNIT_TEST";
        env::set_var(format!("{prefix}_CORE_SIZE"), "2");
        env::set_var(format!("{prefix}_MAX_SIZE"), "5");
        env::set_var(format!("{prefix}_QUEUE_CAPACITY"), "10");
        env::set_var(format!("{prefix}_REJECTION"), "caller_runs");

        let cfg = WorkerPoolConfig::from_env_with_prefix(prefix).unwrap();
        assert_eq!(cfg.core_size, 2);
        assert_eq!(cfg.max_size, 5);
        assert_eq!(cfg.queue_capacity, 10);
        assert_eq!(cfg.rejection, Rejection::CallerRuns);
        assert_eq!(cfg.keep_alive_ms, 60_000);
    }

    #[test]
    fn test_env_parse_error_names_variable() {
        let prefix = "POOL_CFG_UNIT_BAD";
        env::set_var(format!("{prefix}_MAX_SIZE"), "lots");
        let err = WorkerPoolConfig::from_env_with_prefix(prefix).unwrap_err();
        assert!(err.starts_with("POOL_CFG_UNIT_BAD_MAX_SIZE:"), "{err}");
    }
}
