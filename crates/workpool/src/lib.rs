//! # workpool - bounded concurrent task execution
//!
//! A fixed pool of OS-thread workers consuming closures from a bounded
//! queue. Submitters get a `TaskFuture` per task; a full queue blocks
//! `submit` (backpressure). Shutdown is graceful (drain the queue) or
//! forced (cancel what has not started, flag what is running).
//!
//! ## Quick Start
//!
//! ```ignore
//! use workpool::{PoolConfig, Runtime, Task};
//!
//! fn main() -> workpool::PoolResult<()> {
//!     let runtime = Runtime::new(PoolConfig::from_env().num_workers(4));
//!
//!     let squares = runtime.block_on(|sched| {
//!         sched.run_all((0..10u64).map(|i| Task::from_fn(move || i * i)))
//!     })??;
//!
//!     println!("{:?}", squares);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Scheduler                           │
//! │     run_all, run_with_timeout, cancellation token, fan-out  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         WorkerPool                          │
//! │         BoundedQueue<Job> ─> Worker × N ─> TaskFuture       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   Mutex · CountingSemaphore · BroadcastEvent · Parking      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use workpool_core::{
    BoundedQueue,
    BroadcastEvent,
    CountingSemaphore,
    FutureState,
    Mutex,
    MutexGuard,
    PoolError,
    PoolResult,
    PoolState,
    SemaphorePermit,
    Task,
    TaskError,
    TaskErrorKind,
    TaskFuture,
    TaskId,
    TryPutError,
};

// Re-export kprint macros for debug logging
pub use workpool_core::{kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use workpool_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use workpool_core::{env_get, env_get_bool, env_get_opt, env_get_str};

// Re-export runtime types
pub use workpool_runtime::{
    current_worker_id,
    BatchResult,
    ConfigError,
    PoolConfig,
    PoolStats,
    Scheduler,
    ThreadBackend,
    WorkerBackend,
    WorkerPool,
    WorkerState,
};

/// Owns a configuration and runs closures against a fresh scheduler
///
/// Each `block_on` call starts a pool, hands the caller a `Scheduler`,
/// and shuts the pool down gracefully once the closure returns.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: PoolConfig,
}

impl Runtime {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Runtime configured from `WP_*` environment variables
    pub fn from_env() -> Self {
        Self::new(PoolConfig::from_env())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Run `f` with an active scheduler, then drain and stop it
    ///
    /// Fails only if the pool cannot be started.
    pub fn block_on<F, T>(&self, f: F) -> PoolResult<T>
    where
        F: FnOnce(&Scheduler) -> T,
    {
        if self.config.debug_logging {
            self.config.print();
        }
        let sched = Scheduler::with_config(self.config.clone())?;
        let result = f(&sched);
        sched.shutdown(true);
        Ok(result)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_block_on_runs_and_drains() {
        let runtime = Runtime::new(PoolConfig::new().num_workers(2).queue_capacity(4));
        let done = Arc::new(AtomicUsize::new(0));

        let d = Arc::clone(&done);
        let stats = runtime
            .block_on(move |sched| {
                for _ in 0..8 {
                    let d = Arc::clone(&d);
                    sched
                        .fire_and_forget(Task::from_fn(move || {
                            d.fetch_add(1, Ordering::SeqCst);
                        }))
                        .unwrap();
                }
                sched.pool().stats()
            })
            .unwrap();

        assert_eq!(stats.submitted, 8);
        // block_on returned only after the graceful shutdown
        assert_eq!(done.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_block_on_returns_value() {
        let runtime = Runtime::new(PoolConfig::new().num_workers(3).queue_capacity(2));
        let results = runtime
            .block_on(|sched| sched.run_all((1..=5u32).map(|i| Task::from_fn(move || i * 10))))
            .unwrap()
            .unwrap();
        let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_block_on_rejects_bad_config() {
        let runtime = Runtime::new(PoolConfig::new().num_workers(0));
        assert!(matches!(
            runtime.block_on(|_| ()),
            Err(PoolError::InvalidConfig(_))
        ));
    }
}
