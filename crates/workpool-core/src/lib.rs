//! # workpool-core
//!
//! Core types and synchronization primitives for the workpool engine.
//!
//! Nothing in this crate spawns threads. The worker loop, the pool and the
//! scheduler facade live in `workpool-runtime`; this crate provides the
//! building blocks they compose.
//!
//! ## Modules
//!
//! - `id` - Task sequence numbers
//! - `state` - Future and pool lifecycle enums
//! - `error` - Error taxonomy (`PoolError`, `TaskError`)
//! - `parking` - Epoch-based thread parking (futex on Linux)
//! - `mutex` - Parking mutex guarding shared engine state
//! - `semaphore` - Counting semaphore with RAII permits
//! - `event` - One-shot broadcast event / cancellation flag
//! - `queue` - Bounded blocking FIFO with close semantics
//! - `future` - Single-writer, multi-reader result cell
//! - `task` - Task description (closure + cancellation flag)
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod error;
pub mod parking;
pub mod mutex;
pub mod semaphore;
pub mod event;
pub mod queue;
pub mod future;
pub mod task;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::TaskId;
pub use state::{FutureState, PoolState};
pub use error::{PoolError, PoolResult, TaskError, TaskErrorKind, TryPutError};
pub use mutex::{Mutex, MutexGuard};
pub use semaphore::{CountingSemaphore, SemaphorePermit};
pub use event::BroadcastEvent;
pub use queue::BoundedQueue;
pub use future::TaskFuture;
pub use task::Task;
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str};
