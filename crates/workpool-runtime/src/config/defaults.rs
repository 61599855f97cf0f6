//! Compile-time defaults for `PoolConfig`
//!
//! Every value here can be overridden at runtime through the matching
//! `WP_*` environment variable (see `PoolConfig::from_env`).

/// Worker count when `available_parallelism` cannot be queried
pub const FALLBACK_NUM_WORKERS: usize = 4;

/// Upper bound on workers accepted by `validate`
pub const MAX_WORKERS: usize = 1024;

/// Task queue capacity
pub const QUEUE_CAPACITY: usize = 64;

/// Worker thread name prefix; threads are named `<prefix>-<index>`
pub const THREAD_PREFIX: &str = "workpool-worker";

/// Worker stack size in bytes; 0 keeps the platform default
pub const STACK_SIZE: usize = 0;

/// Smallest explicit stack size accepted by `validate`
pub const MIN_STACK_SIZE: usize = 64 * 1024;

pub const DEBUG_LOGGING: bool = false;

/// Worker count: one per available CPU
pub fn num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_NUM_WORKERS)
        .min(MAX_WORKERS)
}
