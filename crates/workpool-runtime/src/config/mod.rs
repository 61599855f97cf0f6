//! Pool configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env` only)
//! 3. Library defaults (`config::defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use workpool_runtime::config::PoolConfig;
//!
//! let config = PoolConfig::from_env()
//!     .num_workers(8)
//!     .queue_capacity(256);
//! config.validate()?;
//! ```

pub mod defaults;

use workpool_core::env::{env_get, env_get_bool, env_get_str};
use workpool_core::PoolError;

/// Worker pool configuration with builder methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers (fixed for the pool's lifetime)
    pub num_workers: usize,
    /// Task queue capacity; a full queue blocks `submit`
    pub queue_capacity: usize,
    /// Worker thread name prefix
    pub thread_prefix: String,
    /// Worker stack size in bytes (0 = platform default)
    pub stack_size: usize,
    /// Log pool lifecycle at info level
    pub debug_logging: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolConfig {
    /// Library defaults with environment overrides
    ///
    /// Environment variables (all optional):
    /// - `WP_NUM_WORKERS` - Number of workers
    /// - `WP_QUEUE_CAPACITY` - Task queue capacity
    /// - `WP_THREAD_PREFIX` - Worker thread name prefix
    /// - `WP_STACK_SIZE` - Worker stack size in bytes
    /// - `WP_DEBUG` - Lifecycle logging (0/1)
    pub fn from_env() -> Self {
        Self {
            num_workers: env_get("WP_NUM_WORKERS", defaults::num_workers()),
            queue_capacity: env_get("WP_QUEUE_CAPACITY", defaults::QUEUE_CAPACITY),
            thread_prefix: env_get_str("WP_THREAD_PREFIX", defaults::THREAD_PREFIX),
            stack_size: env_get("WP_STACK_SIZE", defaults::STACK_SIZE),
            debug_logging: env_get_bool("WP_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Library defaults only (no env override)
    pub fn new() -> Self {
        Self {
            num_workers: defaults::num_workers(),
            queue_capacity: defaults::QUEUE_CAPACITY,
            thread_prefix: defaults::THREAD_PREFIX.to_string(),
            stack_size: defaults::STACK_SIZE,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn queue_capacity(mut self, cap: usize) -> Self {
        self.queue_capacity = cap;
        self
    }

    pub fn thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Check the configuration before any worker is started
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidValue("num_workers must be > 0"));
        }
        if self.num_workers > defaults::MAX_WORKERS {
            return Err(ConfigError::InvalidValue("num_workers must be <= 1024"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("queue_capacity must be > 0"));
        }
        if self.stack_size != 0 && self.stack_size < defaults::MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be 0 or >= 64KB"));
        }
        if self.thread_prefix.is_empty() {
            return Err(ConfigError::InvalidValue("thread_prefix must not be empty"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("workpool configuration:");
        eprintln!("  num_workers:     {}", self.num_workers);
        eprintln!("  queue_capacity:  {}", self.queue_capacity);
        eprintln!("  thread_prefix:   {}", self.thread_prefix);
        if self.stack_size == 0 {
            eprintln!("  stack_size:      (platform default)");
        } else {
            eprintln!("  stack_size:      {}", self.stack_size);
        }
        eprintln!("  debug_logging:   {}", self.debug_logging);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for PoolError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => PoolError::InvalidConfig(msg),
        }
    }
}
