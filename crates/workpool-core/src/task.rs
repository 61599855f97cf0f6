//! Task description
//!
//! A `Task<R>` is a closure producing `R` plus the cooperative cancellation
//! flag the worker checks before running it. The body is boxed so tasks
//! with different closures but the same result type can share a queue.

use crate::error::{BoxError, TaskError};
use crate::event::BroadcastEvent;

/// Boxed task body; receives the task's cancellation flag
pub type TaskBody<R> = Box<dyn FnOnce(&BroadcastEvent) -> Result<R, TaskError> + Send + 'static>;

/// A unit of work for the pool
///
/// Cancellation is cooperative: setting the flag before a worker picks
/// the task up means the body never runs; setting it afterwards is only
/// observed if the body polls the event it receives.
pub struct Task<R> {
    body: TaskBody<R>,
    cancel: BroadcastEvent,
}

impl<R: 'static> Task<R> {
    /// Task from a fallible closure
    ///
    /// Any error convertible into `Box<dyn Error + Send + Sync>` is
    /// accepted and surfaces through the future as a `TaskError`.
    pub fn new<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::with_cancel_flag(BroadcastEvent::new(), move |_| f())
    }

    /// Task from a closure that cannot fail
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Self {
            body: Box::new(move |_| Ok(f())),
            cancel: BroadcastEvent::new(),
        }
    }

    /// Task whose body polls its own, fresh cancellation flag
    pub fn with_token<F, E>(f: F) -> Self
    where
        F: FnOnce(&BroadcastEvent) -> Result<R, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::with_cancel_flag(BroadcastEvent::new(), f)
    }

    /// Task bound to an existing event
    ///
    /// The event is both the flag the worker checks before execution and
    /// the token handed to the body, so one event can stop a whole batch.
    pub fn with_cancel_flag<F, E>(token: BroadcastEvent, f: F) -> Self
    where
        F: FnOnce(&BroadcastEvent) -> Result<R, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            body: Box::new(move |token| f(token).map_err(|e| TaskError::from_error(e.into()))),
            cancel: token,
        }
    }
}

impl<R> Task<R> {
    /// Reassemble a task from `into_parts` output
    pub fn from_parts(body: TaskBody<R>, cancel: BroadcastEvent) -> Self {
        Self { body, cancel }
    }

    /// Handle to this task's cancellation flag
    pub fn cancel_handle(&self) -> BroadcastEvent {
        self.cancel.clone()
    }

    /// Request cancellation; returns `true` on the first request
    pub fn cancel(&self) -> bool {
        self.cancel.set()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }

    /// Run the body on the current thread, ignoring the cancellation flag
    ///
    /// Panics propagate; the worker wraps this in its own panic boundary.
    pub fn run(self) -> Result<R, TaskError> {
        (self.body)(&self.cancel)
    }

    /// Split into body and flag
    pub fn into_parts(self) -> (TaskBody<R>, BroadcastEvent) {
        (self.body, self.cancel)
    }
}

impl<R> std::fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
