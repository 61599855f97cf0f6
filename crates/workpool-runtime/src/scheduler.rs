//! Scheduler facade
//!
//! Submission patterns on top of a `WorkerPool`: run a batch and collect
//! results in input order, run a batch under one overall deadline, run a
//! batch that a shared token can stop, and bounded fan-out where a
//! semaphore caps how many bodies run at once regardless of pool size.

use std::sync::Arc;
use std::time::{Duration, Instant};
use workpool_core::error::BoxError;
use workpool_core::{
    kdebug, BroadcastEvent, CountingSemaphore, PoolError, PoolResult, Task, TaskFuture, TaskId,
};
use crate::config::PoolConfig;
use crate::pool::WorkerPool;

/// Per-task outcomes of a batch, in input order
pub type BatchResult<R> = PoolResult<Vec<PoolResult<R>>>;

/// High-level entry point owning a pool and a scheduler-wide stop token
pub struct Scheduler {
    pool: WorkerPool,
    stop: BroadcastEvent,
}

impl Scheduler {
    /// Scheduler over a new thread pool of `workers` and `queue_capacity`
    pub fn new(workers: usize, queue_capacity: usize) -> PoolResult<Self> {
        Ok(Self::from_pool(WorkerPool::new(workers, queue_capacity)?))
    }

    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        Ok(Self::from_pool(WorkerPool::with_config(config)?))
    }

    pub fn from_pool(pool: WorkerPool) -> Self {
        Self {
            pool,
            stop: BroadcastEvent::new(),
        }
    }

    #[inline]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Scheduler-wide stop event; set by `shutdown(false)`
    ///
    /// Bodies may poll it; tasks created with
    /// `Task::with_cancel_flag(scheduler.stop_token(), ..)` are also
    /// skipped if still queued when it is set.
    pub fn stop_token(&self) -> BroadcastEvent {
        self.stop.clone()
    }

    pub fn submit<R: Send + 'static>(&self, task: Task<R>) -> PoolResult<TaskFuture<R>> {
        self.pool.submit(task)
    }

    /// Submit and drop the future; the outcome only shows up in stats
    pub fn fire_and_forget<R: Send + 'static>(&self, task: Task<R>) -> PoolResult<TaskId> {
        self.pool.submit(task).map(|f| f.id())
    }

    pub fn map<R, I>(&self, tasks: I) -> PoolResult<Vec<TaskFuture<R>>>
    where
        R: Send + 'static,
        I: IntoIterator<Item = Task<R>>,
    {
        self.pool.map(tasks)
    }

    /// Submit all, wait for all; results follow input order
    ///
    /// The outer error is a submission failure; per-task failures are in
    /// the vector.
    pub fn run_all<R, I>(&self, tasks: I) -> BatchResult<R>
    where
        R: Send + 'static,
        I: IntoIterator<Item = Task<R>>,
    {
        let futures = self.pool.map(tasks)?;
        Ok(futures.into_iter().map(TaskFuture::into_result).collect())
    }

    /// Like `run_all` but with one deadline for the whole batch
    ///
    /// Tasks not settled when the deadline passes report `Err(Timeout)`
    /// and keep running in the pool.
    pub fn run_with_timeout<R, I>(&self, tasks: I, timeout: Duration) -> BatchResult<R>
    where
        R: Send + 'static,
        I: IntoIterator<Item = Task<R>>,
    {
        let deadline = Instant::now().checked_add(timeout);
        let futures = self.pool.map(tasks)?;

        let results: Vec<_> = futures
            .into_iter()
            .map(|f| match deadline {
                Some(d) => f.take(d.saturating_duration_since(Instant::now())),
                None => f.into_result(),
            })
            .collect();

        let timed_out = results.iter().filter(|r| matches!(r, Err(PoolError::Timeout))).count();
        if timed_out > 0 {
            kdebug!("batch deadline {:?} passed with {} task(s) unsettled", timeout, timed_out);
        }
        Ok(results)
    }

    /// Run bodies that all share `token`
    ///
    /// The token is each body's argument and each task's cancellation
    /// flag: once set, bodies that poll it stop early and tasks still
    /// queued are cancelled without running.
    pub fn run_with_cancellation_token<R, E, F, I>(
        &self,
        token: &BroadcastEvent,
        bodies: I,
    ) -> BatchResult<R>
    where
        R: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce(&BroadcastEvent) -> Result<R, E> + Send + 'static,
        I: IntoIterator<Item = F>,
    {
        self.run_all(
            bodies
                .into_iter()
                .map(|body| Task::with_cancel_flag(token.clone(), body)),
        )
    }

    /// Run a batch with at most `limit` bodies executing at once
    ///
    /// The permit is taken inside the worker, around the body, so the
    /// bound holds independently of the pool size.
    pub fn run_bounded<R, I>(&self, tasks: I, limit: usize) -> BatchResult<R>
    where
        R: Send + 'static,
        I: IntoIterator<Item = Task<R>>,
    {
        if limit == 0 {
            return Err(PoolError::InvalidConfig("concurrency limit must be >= 1"));
        }
        let permits = Arc::new(CountingSemaphore::new(limit));

        self.run_all(tasks.into_iter().map(|task| {
            let permits = Arc::clone(&permits);
            let (body, flag) = task.into_parts();
            Task::from_parts(
                Box::new(move |token: &BroadcastEvent| {
                    let _permit = permits.permit();
                    body(token)
                }),
                flag,
            )
        }))
    }

    /// Shut the pool down; `graceful == false` also sets the stop token
    pub fn shutdown(&self, graceful: bool) {
        if !graceful {
            self.stop.set();
        }
        self.pool.shutdown(graceful);
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pool", &self.pool)
            .field("stopped", &self.stop.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
    use std::thread;

    const LONG: Duration = Duration::from_secs(10);

    #[test]
    fn test_run_all_keeps_input_order() {
        let sched = Scheduler::new(4, 2).unwrap();
        let results = sched
            .run_all((0..12u64).map(|i| {
                Task::from_fn(move || {
                    // Later tasks finish first
                    thread::sleep(Duration::from_millis(12 - i));
                    i
                })
            }))
            .unwrap();

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_all_reports_each_failure() {
        let sched = Scheduler::new(2, 4).unwrap();
        let results = sched
            .run_all((0..4u32).map(|i| {
                Task::new(move || if i == 2 { Err("odd one out") } else { Ok(i) })
            }))
            .unwrap();

        assert_eq!(results[0].as_ref().unwrap(), &0);
        assert!(matches!(&results[2], Err(PoolError::Task(e)) if e.message() == "odd one out"));
        assert_eq!(results[3].as_ref().unwrap(), &3);
        assert!(sched.pool().wait_idle(Some(LONG)));
        assert_eq!(sched.pool().stats().failed, 1);
    }

    #[test]
    fn test_run_all_non_clone_results() {
        let sched = Scheduler::new(2, 2).unwrap();
        let results = sched
            .run_all((0..4u8).map(|i| Task::from_fn(move || Box::new([i; 3]) as Box<[u8]>)))
            .unwrap();

        let firsts: Vec<u8> = results.into_iter().map(|r| r.unwrap()[0]).collect();
        assert_eq!(firsts, vec![0, 1, 2, 3]);

        let (tx, rx) = std::sync::mpsc::channel();
        let mut results = sched
            .run_bounded(vec![Task::from_fn(move || rx)], 1)
            .unwrap();
        tx.send("through the pool").unwrap();
        assert_eq!(results.remove(0).unwrap().recv().unwrap(), "through the pool");
    }

    #[test]
    fn test_run_with_timeout() {
        let sched = Scheduler::new(2, 4).unwrap();
        let release = BroadcastEvent::new();
        let r = release.clone();

        let tasks = vec![
            Task::from_fn(|| 1u32),
            Task::from_fn(move || {
                r.wait();
                2u32
            }),
        ];
        let start = Instant::now();
        let results = sched.run_with_timeout(tasks, Duration::from_millis(50)).unwrap();

        assert!(start.elapsed() < LONG);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(matches!(results[1], Err(PoolError::Timeout)));

        release.set();
        sched.shutdown(true);
    }

    #[test]
    fn test_cancellation_token_stops_batch() {
        let sched = Scheduler::new(1, 8).unwrap();
        let token = BroadcastEvent::new();
        let started = BroadcastEvent::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let trigger = {
            let token = token.clone();
            let started = started.clone();
            thread::spawn(move || {
                started.wait();
                token.set();
            })
        };

        let bodies: Vec<_> = (0..5)
            .map(|i| {
                let ran = Arc::clone(&ran);
                let started = started.clone();
                move |tok: &BroadcastEvent| -> Result<u32, PoolError> {
                    ran.fetch_add(1, Ordering::SeqCst);
                    if i == 0 {
                        started.set();
                        // Poll until stopped
                        loop {
                            tok.check()?;
                            thread::sleep(Duration::from_millis(1));
                        }
                    }
                    Ok(i)
                }
            })
            .collect();

        let results = sched.run_with_cancellation_token(&token, bodies).unwrap();
        trigger.join().unwrap();

        assert!(results.iter().all(|r| matches!(r, Err(PoolError::Cancelled))));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(sched.pool().wait_idle(Some(LONG)));
        assert_eq!(sched.pool().stats().cancelled, 5);
    }

    #[test]
    fn test_run_bounded_caps_concurrency() {
        const LIMIT: isize = 2;
        let sched = Scheduler::new(6, 16).unwrap();
        let inside = Arc::new(AtomicIsize::new(0));
        let peak = Arc::new(AtomicIsize::new(0));

        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                Task::from_fn(move || {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    i
                })
            })
            .collect();

        let results = sched.run_bounded(tasks, LIMIT as usize).unwrap();
        assert_eq!(results.len(), 12);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= LIMIT);

        assert!(matches!(
            sched.run_bounded(vec![Task::from_fn(|| 0)], 0),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fire_and_forget_counts() {
        let sched = Scheduler::new(2, 4).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let hits = Arc::clone(&hits);
            sched
                .fire_and_forget(Task::from_fn(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        sched.shutdown(true);
        assert_eq!(hits.load(Ordering::SeqCst), 6);
        assert_eq!(sched.pool().stats().completed, 6);
    }

    #[test]
    fn test_forced_shutdown_sets_stop_token() {
        let sched = Scheduler::new(1, 4).unwrap();
        let stop = sched.stop_token();
        let fut = sched
            .submit(Task::with_cancel_flag(stop.clone(), |tok| {
                while !tok.is_set() {
                    thread::sleep(Duration::from_millis(1));
                }
                tok.check()?;
                Ok::<u8, PoolError>(0)
            }))
            .unwrap();

        thread::sleep(Duration::from_millis(10));
        sched.shutdown(false);
        assert!(stop.is_set());
        assert!(fut.is_cancelled());
        assert!(matches!(sched.submit(Task::from_fn(|| 1u8)), Err(PoolError::PoolNotRunning)));
    }
}
