//! # workpool-runtime
//!
//! The moving parts of the workpool engine, built on `workpool-core`:
//!
//! - `config` - `PoolConfig` with compile-time defaults and `WP_*` overrides
//! - `backend` - How workers are started (`WorkerBackend`, `ThreadBackend`)
//! - `worker` - Worker loop and per-worker state
//! - `pool` - `WorkerPool`: bounded queue, submit/map/shutdown, stats
//! - `scheduler` - `Scheduler` facade: batches, deadlines, tokens, fan-out
//!
//! Data flow:
//!
//! ```text
//! Scheduler::submit ─> WorkerPool::submit ─> BoundedQueue::put
//!                                                  │
//!               TaskFuture::get <─ resolve/fail <─ Worker (get + run)
//! ```

pub mod config;
pub mod backend;
mod job;
pub mod worker;
pub mod pool;
pub mod scheduler;

// Re-exports
pub use config::{ConfigError, PoolConfig};
pub use backend::{ThreadBackend, WorkerBackend, WorkerHandle, WorkerMain};
pub use worker::{current_worker_id, WorkerState};
pub use pool::{PoolStats, WorkerPool};
pub use scheduler::{BatchResult, Scheduler};
