//! Worker backends
//!
//! A backend decides what a "worker" physically is. The pool hands it a
//! worker main function per index and gets back a handle it can join.
//! `ThreadBackend` runs each worker on a named OS thread. A process-based
//! backend would implement the same trait, but it needs task payloads
//! that can cross an address-space boundary, which boxed closures cannot.

use std::thread::{self, JoinHandle};
use workpool_core::{PoolError, PoolResult};
use crate::config::PoolConfig;

/// Entry point of one worker
pub type WorkerMain = Box<dyn FnOnce() + Send + 'static>;

/// Strategy for starting workers
///
/// A second backend plugs in at pool construction. This one wraps the
/// thread backend and counts spawns; a process backend would instead
/// start a child per index and return a handle that waits on it.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use workpool_core::{PoolResult, Task};
/// use workpool_runtime::{
///     PoolConfig, ThreadBackend, WorkerBackend, WorkerHandle, WorkerMain, WorkerPool,
/// };
///
/// struct Counted {
///     inner: ThreadBackend,
///     spawned: AtomicUsize,
/// }
///
/// impl WorkerBackend for Counted {
///     fn name(&self) -> &'static str {
///         "counted"
///     }
///
///     fn spawn(&self, index: usize, main: WorkerMain) -> PoolResult<Box<dyn WorkerHandle>> {
///         self.spawned.fetch_add(1, Ordering::SeqCst);
///         self.inner.spawn(index, main)
///     }
/// }
///
/// let backend = Counted {
///     inner: ThreadBackend::new("counted"),
///     spawned: AtomicUsize::new(0),
/// };
/// let config = PoolConfig::new().num_workers(2).queue_capacity(2);
/// let pool = WorkerPool::with_backend(config, Box::new(backend)).unwrap();
/// assert_eq!(pool.submit(Task::from_fn(|| 5)).unwrap().wait().unwrap(), 5);
/// pool.shutdown(true);
/// ```
pub trait WorkerBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Start worker `index` running `main`
    fn spawn(&self, index: usize, main: WorkerMain) -> PoolResult<Box<dyn WorkerHandle>>;
}

/// Handle to a started worker
pub trait WorkerHandle: Send {
    /// Block until the worker exits; `false` if it died abnormally
    fn join(self: Box<Self>) -> bool;

    fn is_finished(&self) -> bool;
}

/// One OS thread per worker, named `<prefix>-<index>`
#[derive(Debug, Clone)]
pub struct ThreadBackend {
    prefix: String,
    stack_size: usize,
}

impl ThreadBackend {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            stack_size: 0,
        }
    }

    /// Backend using the config's thread prefix and stack size
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.thread_prefix.clone()).stack_size(config.stack_size)
    }

    /// Stack size in bytes; 0 keeps the platform default
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }
}

impl WorkerBackend for ThreadBackend {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn spawn(&self, index: usize, main: WorkerMain) -> PoolResult<Box<dyn WorkerHandle>> {
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.prefix, index));
        if self.stack_size != 0 {
            builder = builder.stack_size(self.stack_size);
        }
        let handle = builder
            .spawn(main)
            .map_err(|e| PoolError::SpawnFailed(e.to_string()))?;
        Ok(Box::new(ThreadHandle(handle)))
    }
}

struct ThreadHandle(JoinHandle<()>);

impl WorkerHandle for ThreadHandle {
    fn join(self: Box<Self>) -> bool {
        self.0.join().is_ok()
    }

    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_thread_backend_names_threads() {
        let backend = ThreadBackend::new("unit").stack_size(128 * 1024);
        let (tx, rx) = mpsc::channel();

        let handle = backend
            .spawn(
                7,
                Box::new(move || {
                    let name = thread::current().name().map(str::to_string);
                    tx.send(name).unwrap();
                }),
            )
            .unwrap();

        assert!(handle.join());
        assert_eq!(rx.recv().unwrap().as_deref(), Some("unit-7"));
    }

    #[test]
    fn test_join_reports_abnormal_exit() {
        let backend = ThreadBackend::new("unit");
        let handle = backend.spawn(0, Box::new(|| panic!("worker died"))).unwrap();
        assert!(!handle.join());
    }

    #[test]
    fn test_from_config() {
        let config = PoolConfig::new().thread_prefix("cfg").stack_size(256 * 1024);
        let backend = ThreadBackend::from_config(&config);
        assert_eq!(backend.name(), "thread");
        assert_eq!(backend.stack_size, 256 * 1024);
        assert_eq!(backend.prefix, "cfg");
    }
}
