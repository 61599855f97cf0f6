//! Result cell for a submitted task
//!
//! A `TaskFuture` is shared by the submitter (reader) and the worker that
//! runs the task (writer). It moves from Pending to exactly one terminal
//! state (Resolved, Failed or Cancelled). Later transition attempts
//! return `false` and leave the first outcome in place.
//!
//! Readers either clone the value (`get`, `wait`, `try_get`, for
//! `R: Clone`) or move it out once (`take`, `into_result`, for any `R`).

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crate::error::{PoolError, PoolResult, TaskError};
use crate::event::BroadcastEvent;
use crate::id::TaskId;
use crate::mutex::Mutex;
use crate::state::FutureState;

type DoneCallback<R> = Box<dyn FnOnce(&TaskFuture<R>) + Send + 'static>;

/// Handle to a task's eventual outcome
pub struct TaskFuture<R> {
    inner: Arc<FutureInner<R>>,
}

struct FutureInner<R> {
    id: TaskId,

    /// Published copy of the state for lock-free polling
    state: AtomicU8,

    slot: Mutex<Slot<R>>,

    /// Set once the terminal state is stored
    done: BroadcastEvent,
}

struct Slot<R> {
    outcome: Outcome<R>,
    callbacks: Vec<DoneCallback<R>>,
}

enum Outcome<R> {
    Pending,
    Resolved(R),
    /// Resolved, value already moved out by `take`
    Taken,
    Failed(TaskError),
    Cancelled,
}

impl<R> Outcome<R> {
    fn state(&self) -> FutureState {
        match self {
            Outcome::Pending => FutureState::Pending,
            Outcome::Resolved(_) | Outcome::Taken => FutureState::Resolved,
            Outcome::Failed(_) => FutureState::Failed,
            Outcome::Cancelled => FutureState::Cancelled,
        }
    }
}

impl<R> TaskFuture<R> {
    /// Create a pending future for task `id`
    pub fn new(id: TaskId) -> Self {
        Self {
            inner: Arc::new(FutureInner {
                id,
                state: AtomicU8::new(FutureState::Pending as u8),
                slot: Mutex::new(Slot {
                    outcome: Outcome::Pending,
                    callbacks: Vec::new(),
                }),
                done: BroadcastEvent::new(),
            }),
        }
    }

    /// Id of the task this future belongs to
    #[inline]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Store a value. Returns `false` if already terminal.
    pub fn resolve(&self, value: R) -> bool {
        self.complete(Outcome::Resolved(value))
    }

    /// Store a failure. Returns `false` if already terminal.
    pub fn fail(&self, err: TaskError) -> bool {
        self.complete(Outcome::Failed(err))
    }

    /// Mark cancelled. Returns `false` if already terminal.
    ///
    /// This settles the handle only. A body that is already running is
    /// not told; to stop it, set the task's own flag as well
    /// (`Task::cancel_handle`), which such a body can poll.
    pub fn cancel(&self) -> bool {
        self.complete(Outcome::Cancelled)
    }

    fn complete(&self, outcome: Outcome<R>) -> bool {
        let callbacks = {
            let mut slot = self.inner.slot.lock();
            if !matches!(slot.outcome, Outcome::Pending) {
                return false;
            }
            self.inner.state.store(outcome.state() as u8, Ordering::Release);
            slot.outcome = outcome;
            std::mem::take(&mut slot.callbacks)
        };

        self.inner.done.set();
        for callback in callbacks {
            self.run_callback(callback);
        }
        true
    }

    fn run_callback(&self, callback: DoneCallback<R>) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(self)));
        if result.is_err() {
            crate::kwarn!("done-callback for task {} panicked", self.id());
        }
    }

    /// Register `callback` to run once the future is terminal
    ///
    /// Runs immediately on the calling thread if the future is already
    /// terminal, otherwise on the thread that completes it. Each callback
    /// runs exactly once.
    pub fn add_done_callback<F>(&self, callback: F)
    where
        F: FnOnce(&TaskFuture<R>) + Send + 'static,
    {
        {
            let mut slot = self.inner.slot.lock();
            if matches!(slot.outcome, Outcome::Pending) {
                slot.callbacks.push(Box::new(callback));
                return;
            }
        }
        self.run_callback(Box::new(callback));
    }

    /// Current state (non-blocking)
    #[inline]
    pub fn state(&self) -> FutureState {
        FutureState::from(self.inner.state.load(Ordering::Acquire))
    }

    /// Non-blocking poll
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state() == FutureState::Cancelled
    }

    /// Block until terminal, without reading the outcome
    pub fn join(&self) {
        self.inner.done.wait();
    }

    /// Block until terminal or `timeout`; returns `true` if terminal
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        self.inner.done.wait_timeout(timeout)
    }

    /// Like `get`, but moves the value out instead of cloning it
    ///
    /// Only the first successful `take` gets the value; later reads of a
    /// taken value through any handle return `Err(ResultTaken)`. Failed
    /// and cancelled outcomes can be read any number of times.
    pub fn take(&self, timeout: Duration) -> PoolResult<R> {
        if !self.inner.done.wait_timeout(timeout) {
            return Err(PoolError::Timeout);
        }
        self.take_outcome()
    }

    /// Block until terminal and move the outcome out of this handle
    pub fn into_result(self) -> PoolResult<R> {
        self.inner.done.wait();
        self.take_outcome()
    }

    fn take_outcome(&self) -> PoolResult<R> {
        let mut slot = self.inner.slot.lock();
        match std::mem::replace(&mut slot.outcome, Outcome::Taken) {
            Outcome::Resolved(v) => Ok(v),
            other => {
                let result = other.to_error();
                slot.outcome = other;
                Err(result)
            }
        }
    }
}

impl<R> Outcome<R> {
    /// Error a reader sees for anything but a stored value
    fn to_error(&self) -> PoolError {
        match self {
            Outcome::Failed(e) => PoolError::Task(e.clone()),
            Outcome::Cancelled => PoolError::Cancelled,
            Outcome::Taken => PoolError::ResultTaken,
            // `done` is only set after the outcome is stored
            Outcome::Pending | Outcome::Resolved(_) => PoolError::Timeout,
        }
    }
}

impl<R: Clone> TaskFuture<R> {
    /// Block until terminal or until `timeout` elapses
    ///
    /// On timeout returns `Err(Timeout)` and leaves the future untouched:
    /// the task keeps running and a later `get` still observes the real
    /// outcome.
    pub fn get(&self, timeout: Duration) -> PoolResult<R> {
        if !self.inner.done.wait_timeout(timeout) {
            return Err(PoolError::Timeout);
        }
        self.read()
    }

    /// Block until terminal
    pub fn wait(&self) -> PoolResult<R> {
        self.inner.done.wait();
        self.read()
    }

    /// Outcome if terminal, `None` while pending
    pub fn try_get(&self) -> Option<PoolResult<R>> {
        if self.is_done() {
            Some(self.read())
        } else {
            None
        }
    }

    fn read(&self) -> PoolResult<R> {
        match &self.inner.slot.lock().outcome {
            Outcome::Resolved(v) => Ok(v.clone()),
            other => Err(other.to_error()),
        }
    }
}

impl<R> Clone for TaskFuture<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> std::fmt::Debug for TaskFuture<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFuture")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
