//! Fixed-size worker pool
//!
//! Owns W workers and one bounded task queue. `submit` blocks while the
//! queue is full, which throttles producers to the speed of the workers.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──> Running ──> Draining ──> Stopped
//!             (submit)    (queue closed, workers finishing)
//! ```
//!
//! Graceful shutdown lets every queued task run. Forced shutdown cancels
//! queued tasks, sets the cancellation flag of tasks in flight, and makes
//! workers cancel anything they still dequeue.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use workpool_core::id::TaskIdGen;
use workpool_core::parking::{deadline_after, park_until, Parking, PlatformParking};
use workpool_core::{kdebug, kerror, kinfo, ktrace};
use workpool_core::{
    BoundedQueue, BroadcastEvent, FutureState, Mutex, PoolError, PoolResult, PoolState, Task,
    TaskFuture, TryPutError,
};
use crate::backend::{ThreadBackend, WorkerBackend, WorkerHandle};
use crate::config::PoolConfig;
use crate::job::{Job, TaskJob};
use crate::worker::{Worker, WorkerState};

/// Aggregate task counters, guarded by the pool mutex
#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    submitted: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
}

impl Counters {
    fn settled(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }
}

/// State shared between the pool handle and its workers
pub(crate) struct PoolShared {
    state: AtomicU8,
    force_stop: AtomicBool,
    counters: Mutex<Counters>,
    /// Woken whenever a task settles
    idle: PlatformParking,
    workers: Box<[WorkerState]>,
}

impl PoolShared {
    fn new(num_workers: usize) -> Self {
        Self {
            state: AtomicU8::new(PoolState::Created as u8),
            force_stop: AtomicBool::new(false),
            counters: Mutex::new(Counters::default()),
            idle: PlatformParking::new(),
            workers: (0..num_workers).map(WorkerState::new).collect(),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> PoolState {
        PoolState::from(self.state.load(Ordering::Acquire))
    }

    /// One-directional state step; `false` if not currently in `from`
    fn advance(&self, from: PoolState, to: PoolState) -> bool {
        debug_assert!(from.can_transition_to(to));
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub(crate) fn worker(&self, index: usize) -> &WorkerState {
        &self.workers[index]
    }

    #[inline]
    pub(crate) fn is_force_stopping(&self) -> bool {
        self.force_stop.load(Ordering::SeqCst)
    }

    /// Count a settled task
    pub(crate) fn record(&self, outcome: FutureState) {
        {
            let mut c = self.counters.lock();
            match outcome {
                FutureState::Resolved => c.completed += 1,
                FutureState::Failed => c.failed += 1,
                FutureState::Cancelled => c.cancelled += 1,
                // A job always settles its future before reporting
                FutureState::Pending => {}
            }
        }
        self.idle.unpark_all();
    }

    fn is_idle(&self) -> bool {
        let c = self.counters.lock();
        c.settled() >= c.submitted
    }
}

/// Point-in-time pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub workers: usize,
    /// Jobs waiting in the queue
    pub queued: usize,
    /// Workers currently running a body
    pub active: usize,
    pub submitted: u64,
    /// Resolved successfully
    pub completed: u64,
    /// Body returned an error or panicked
    pub failed: u64,
    pub cancelled: u64,
}

impl PoolStats {
    /// Tasks that reached a terminal state
    pub fn settled(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "workers={} queued={} active={} submitted={} completed={} failed={} cancelled={}",
            self.workers,
            self.queued,
            self.active,
            self.submitted,
            self.completed,
            self.failed,
            self.cancelled
        )
    }
}

macro_rules! lifecycle {
    ($pool:expr, $($arg:tt)*) => {
        if $pool.config.debug_logging {
            kinfo!($($arg)*);
        } else {
            kdebug!($($arg)*);
        }
    };
}

/// Fixed-size pool of workers sharing one bounded queue
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    queue: Arc<BoundedQueue<Box<dyn Job>>>,
    ids: TaskIdGen,
    /// Taken by the one shutdown caller that joins the workers
    handles: Mutex<Vec<Box<dyn WorkerHandle>>>,
    /// Set once every worker has exited
    stopped: BroadcastEvent,
    config: PoolConfig,
    backend: &'static str,
}

impl WorkerPool {
    /// Start `size` thread workers over a queue of `queue_capacity`
    ///
    /// Both must be at least 1, otherwise `Err(InvalidConfig)`.
    pub fn new(size: usize, queue_capacity: usize) -> PoolResult<Self> {
        Self::with_config(
            PoolConfig::new()
                .num_workers(size)
                .queue_capacity(queue_capacity),
        )
    }

    /// Start a thread-backed pool from `config`
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        let backend = ThreadBackend::from_config(&config);
        Self::with_backend(config, Box::new(backend))
    }

    /// Start a pool whose workers come from `backend`
    ///
    /// If any worker fails to start, the ones already started are stopped
    /// and the spawn error is returned.
    pub fn with_backend(config: PoolConfig, backend: Box<dyn WorkerBackend>) -> PoolResult<Self> {
        config.validate()?;

        let queue = Arc::new(BoundedQueue::new(config.queue_capacity)?);
        let shared = Arc::new(PoolShared::new(config.num_workers));
        let mut handles = Vec::with_capacity(config.num_workers);

        for index in 0..config.num_workers {
            let worker = Worker {
                index,
                queue: Arc::clone(&queue),
                shared: Arc::clone(&shared),
            };
            match backend.spawn(index, Box::new(move || worker.run())) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    kerror!("failed to start worker {}: {}", index, e);
                    queue.close();
                    for handle in handles {
                        handle.join();
                    }
                    return Err(e);
                }
            }
        }

        shared.advance(PoolState::Created, PoolState::Running);

        let pool = Self {
            shared,
            queue,
            ids: TaskIdGen::new(),
            handles: Mutex::new(handles),
            stopped: BroadcastEvent::new(),
            backend: backend.name(),
            config,
        };
        lifecycle!(
            pool,
            "pool started: {} {} workers, queue capacity {}",
            pool.config.num_workers,
            pool.backend,
            pool.config.queue_capacity
        );
        Ok(pool)
    }

    fn ensure_running(&self) -> PoolResult<()> {
        if self.shared.state().accepts_submissions() {
            Ok(())
        } else {
            Err(PoolError::PoolNotRunning)
        }
    }

    fn prepare<R: Send + 'static>(&self, task: Task<R>) -> (Box<dyn Job>, TaskFuture<R>) {
        let (job, future) = TaskJob::new(self.ids.next(), task);
        // Counted before the put so `wait_idle` can never see a settled
        // task that is not yet submitted.
        self.shared.counters.lock().submitted += 1;
        (job, future)
    }

    fn unsubmit(&self) {
        self.shared.counters.lock().submitted -= 1;
        self.shared.idle.unpark_all();
    }

    /// Enqueue a task, blocking while the queue is full
    ///
    /// Fails with `PoolNotRunning` once shutdown has begun, including when
    /// shutdown starts while this call is blocked.
    pub fn submit<R: Send + 'static>(&self, task: Task<R>) -> PoolResult<TaskFuture<R>> {
        self.ensure_running()?;
        let (job, future) = self.prepare(task);

        if let Err(e) = self.queue.put(job) {
            self.unsubmit();
            return Err(match e {
                PoolError::QueueClosed => PoolError::PoolNotRunning,
                other => other,
            });
        }
        ktrace!("task {} queued", future.id());
        Ok(future)
    }

    /// Enqueue without blocking; `Err(QueueFull)` at capacity
    pub fn try_submit<R: Send + 'static>(&self, task: Task<R>) -> PoolResult<TaskFuture<R>> {
        self.ensure_running()?;
        let (job, future) = self.prepare(task);

        match self.queue.try_put(job) {
            Ok(()) => Ok(future),
            Err(e) => {
                self.unsubmit();
                Err(match e {
                    TryPutError::Full(_) => PoolError::QueueFull,
                    TryPutError::Closed(_) => PoolError::PoolNotRunning,
                })
            }
        }
    }

    /// Submit every task in order and return their futures in that order
    ///
    /// Stops at the first submission error; tasks submitted before it keep
    /// running.
    pub fn map<R, I>(&self, tasks: I) -> PoolResult<Vec<TaskFuture<R>>>
    where
        R: Send + 'static,
        I: IntoIterator<Item = Task<R>>,
    {
        tasks.into_iter().map(|task| self.submit(task)).collect()
    }

    /// Block until every submitted task has settled
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        park_until(&self.shared.idle, deadline_after(timeout), || self.shared.is_idle())
    }

    /// Stop the pool and wait for every worker to exit
    ///
    /// `graceful == true` runs everything already queued. `false` cancels
    /// every pending future, queued or in flight; in-flight bodies still
    /// run to completion but their results are discarded. Safe to call
    /// repeatedly and from several threads; a forced call escalates a
    /// graceful shutdown already in progress. Every caller returns only once the pool is
    /// Stopped. Must not be called from one of this pool's own tasks.
    pub fn shutdown(&self, graceful: bool) {
        if !graceful {
            self.force_stop();
        }
        if self.shared.advance(PoolState::Running, PoolState::Draining) {
            lifecycle!(self, "pool draining ({})", if graceful { "graceful" } else { "forced" });
        }
        self.queue.close();

        let handles = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            // Another caller owns the join
            self.stopped.wait();
            return;
        }

        let abnormal = handles.into_iter().map(|h| h.join()).filter(|ok| !ok).count();
        if abnormal > 0 {
            kerror!("{} worker(s) exited abnormally", abnormal);
        }

        self.shared.advance(PoolState::Draining, PoolState::Stopped);
        self.stopped.set();
        lifecycle!(self, "pool stopped: {}", self.stats());
    }

    fn force_stop(&self) {
        if self.shared.force_stop.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.advance(PoolState::Running, PoolState::Draining);
        self.queue.close();

        let pending = self.queue.drain();
        let dropped = pending.len();
        for job in pending {
            self.shared.record(job.cancel());
        }

        let aborted = self
            .shared
            .workers
            .iter()
            .filter(|w| w.cancel_in_flight())
            .count();
        lifecycle!(
            self,
            "forced shutdown: {} queued task(s) cancelled, {} in flight aborted",
            dropped,
            aborted
        );
    }

    pub fn stats(&self) -> PoolStats {
        let c = *self.shared.counters.lock();
        PoolStats {
            workers: self.shared.workers.len(),
            queued: self.queue.len(),
            active: self.shared.workers.iter().filter(|w| w.is_busy()).count(),
            submitted: c.submitted,
            completed: c.completed,
            failed: c.failed,
            cancelled: c.cancelled,
        }
    }

    #[inline]
    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.shared.workers.len()
    }

    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn worker_states(&self) -> &[WorkerState] {
        &self.shared.workers
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.state() != PoolState::Stopped {
            self.shutdown(true);
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("state", &self.state())
            .field("backend", &self.backend)
            .field("stats", &self.stats())
            .finish()
    }
}
