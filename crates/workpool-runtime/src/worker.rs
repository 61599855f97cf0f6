//! Worker loop and per-worker state
//!
//! A worker repeatedly takes a job from the pool queue and settles its
//! future. It exits when the queue reports "closed and drained". Failing
//! or panicking bodies never take the worker down with them.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use workpool_core::kprint;
use workpool_core::{kdebug, ktrace};
use workpool_core::{BoundedQueue, Mutex, TaskId};
use crate::job::{AbortHandle, Job};
use crate::pool::PoolShared;

/// Activity record of one worker
///
/// Readable from any thread for diagnostics. The in-flight task's abort
/// handle is kept so a forced shutdown can reach it.
pub struct WorkerState {
    index: usize,
    tasks_run: AtomicU64,
    busy: AtomicBool,
    current: AtomicU64,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl WorkerState {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            tasks_run: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            current: AtomicU64::new(TaskId::NONE.as_u64()),
            in_flight: Mutex::new(None),
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bodies executed so far (skipped/cancelled jobs not included)
    #[inline]
    pub fn tasks_run(&self) -> u64 {
        self.tasks_run.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Task currently executing on this worker
    pub fn current_task(&self) -> Option<TaskId> {
        TaskId::new(self.current.load(Ordering::Acquire)).to_option()
    }

    fn start_running(&self, id: TaskId, abort: AbortHandle) {
        *self.in_flight.lock() = Some(abort);
        self.current.store(id.as_u64(), Ordering::Release);
        self.busy.store(true, Ordering::Release);
    }

    fn stop_running(&self) {
        self.busy.store(false, Ordering::Release);
        self.current.store(TaskId::NONE.as_u64(), Ordering::Release);
        self.in_flight.lock().take();
        self.tasks_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Abort the in-flight task, if any; `true` if its future was pending
    pub(crate) fn cancel_in_flight(&self) -> bool {
        match self.in_flight.lock().as_ref() {
            Some(abort) => abort.abort(),
            None => false,
        }
    }
}

impl std::fmt::Debug for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerState")
            .field("index", &self.index)
            .field("busy", &self.is_busy())
            .field("current", &self.current_task())
            .field("tasks_run", &self.tasks_run())
            .finish()
    }
}

thread_local! {
    static CURRENT_WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Index of the pool worker running on this thread, if any
#[inline]
pub fn current_worker_id() -> Option<usize> {
    CURRENT_WORKER_ID.with(|cell| cell.get())
}

fn set_current_worker_id(id: Option<usize>) {
    CURRENT_WORKER_ID.with(|cell| cell.set(id));
    match id {
        Some(i) => kprint::set_worker_tag(i),
        None => kprint::clear_worker_tag(),
    }
}

/// Everything one worker needs; moved into the worker's thread
pub(crate) struct Worker {
    pub(crate) index: usize,
    pub(crate) queue: Arc<BoundedQueue<Box<dyn Job>>>,
    pub(crate) shared: Arc<PoolShared>,
}

impl Worker {
    /// Worker main loop
    pub(crate) fn run(self) {
        set_current_worker_id(Some(self.index));
        kdebug!("worker started");

        let state = self.shared.worker(self.index);
        while let Some(job) = self.queue.get() {
            let id = job.id();

            let outcome = if self.should_skip(job.as_ref()) {
                ktrace!("task {} cancelled before start", id);
                job.cancel()
            } else {
                state.start_running(id, job.abort_handle());
                // A forced shutdown may have scanned the worker states
                // before the handle above was published.
                if self.shared.is_force_stopping() {
                    state.cancel_in_flight();
                }
                ktrace!("task {} running", id);
                let outcome = job.run();
                state.stop_running();
                outcome
            };

            ktrace!("task {} -> {}", id, outcome);
            self.shared.record(outcome);
        }

        kdebug!("worker exiting after {} tasks", state.tasks_run());
        set_current_worker_id(None);
    }

    fn should_skip(&self, job: &dyn Job) -> bool {
        job.cancel_flag().is_set() || job.is_settled() || self.shared.is_force_stopping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TaskJob;
    use workpool_core::Task;

    #[test]
    fn test_worker_state_transitions() {
        let state = WorkerState::new(2);
        assert_eq!(state.index(), 2);
        assert!(!state.is_busy());
        assert_eq!(state.current_task(), None);
        assert!(!state.cancel_in_flight());

        let task = Task::from_fn(|| 1u8);
        let flag = task.cancel_handle();
        let (job, fut) = TaskJob::new(TaskId::new(9), task);
        state.start_running(job.id(), job.abort_handle());
        assert!(state.is_busy());
        assert_eq!(state.current_task(), Some(TaskId::new(9)));

        assert!(state.cancel_in_flight());
        assert!(flag.is_set());
        assert!(fut.is_cancelled());

        state.stop_running();
        assert!(!state.is_busy());
        assert_eq!(state.current_task(), None);
        assert_eq!(state.tasks_run(), 1);
    }

    #[test]
    fn test_current_worker_id_is_thread_local() {
        assert_eq!(current_worker_id(), None);
        let seen = std::thread::spawn(|| {
            set_current_worker_id(Some(4));
            current_worker_id()
        })
        .join()
        .unwrap();
        assert_eq!(seen, Some(4));
        assert_eq!(current_worker_id(), None);
    }
}
