//! Type-erased queue element
//!
//! The pool's queue holds `Box<dyn Job>` so one pool can run tasks with
//! different result types. A job owns the task body, its cancellation
//! flag and the writer side of its future; whoever holds the box is the
//! only party that can settle the future through it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use workpool_core::task::TaskBody;
use workpool_core::{BroadcastEvent, FutureState, PoolError, Task, TaskError, TaskFuture, TaskId};

pub(crate) trait Job: Send {
    fn id(&self) -> TaskId;

    fn cancel_flag(&self) -> &BroadcastEvent;

    /// Future already terminal (e.g. cancelled through its handle)
    fn is_settled(&self) -> bool;

    /// Handle a forced shutdown uses to abort this job while it runs
    fn abort_handle(&self) -> AbortHandle;

    /// Run the body inside a panic boundary and settle the future
    fn run(self: Box<Self>) -> FutureState;

    /// Settle the future as Cancelled without running the body
    fn cancel(self: Box<Self>) -> FutureState;
}

/// Sets a running job's flag and settles its future as Cancelled
///
/// The body keeps running; whatever it returns later is discarded.
pub(crate) struct AbortHandle {
    flag: BroadcastEvent,
    settle: Box<dyn Fn() -> bool + Send>,
}

impl AbortHandle {
    /// Returns `true` if the future was still pending
    pub(crate) fn abort(&self) -> bool {
        self.flag.set();
        (self.settle)()
    }
}

pub(crate) struct TaskJob<R> {
    id: TaskId,
    body: TaskBody<R>,
    cancel: BroadcastEvent,
    future: TaskFuture<R>,
}

impl<R: Send + 'static> TaskJob<R> {
    /// Wrap `task` and return the job with the caller's future handle
    pub(crate) fn new(id: TaskId, task: Task<R>) -> (Box<dyn Job>, TaskFuture<R>) {
        let (body, cancel) = task.into_parts();
        let future = TaskFuture::new(id);
        let job = Box::new(TaskJob {
            id,
            body,
            cancel,
            future: future.clone(),
        });
        (job, future)
    }
}

fn is_cancellation(err: &TaskError) -> bool {
    matches!(err.downcast_ref::<PoolError>(), Some(PoolError::Cancelled))
}

impl<R: Send + 'static> Job for TaskJob<R> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn cancel_flag(&self) -> &BroadcastEvent {
        &self.cancel
    }

    fn is_settled(&self) -> bool {
        self.future.is_done()
    }

    fn abort_handle(&self) -> AbortHandle {
        let future = self.future.clone();
        AbortHandle {
            flag: self.cancel.clone(),
            settle: Box::new(move || future.cancel()),
        }
    }

    fn run(self: Box<Self>) -> FutureState {
        let TaskJob { id, body, cancel, future } = *self;

        match catch_unwind(AssertUnwindSafe(|| body(&cancel))) {
            Ok(Ok(value)) => {
                future.resolve(value);
            }
            // Body noticed its token and bailed out
            Ok(Err(err)) if is_cancellation(&err) => {
                future.cancel();
            }
            Ok(Err(err)) => {
                workpool_core::kdebug!("task {} failed: {}", id, err);
                future.fail(err);
            }
            Err(payload) => {
                let err = TaskError::from_panic(&*payload);
                workpool_core::kwarn!("task {} panicked: {}", id, err.message());
                future.fail(err);
            }
        }
        future.state()
    }

    fn cancel(self: Box<Self>) -> FutureState {
        self.future.cancel();
        self.future.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workpool_core::TaskErrorKind;

    #[test]
    fn test_run_resolves() {
        let (job, fut) = TaskJob::new(TaskId::new(1), Task::from_fn(|| 21 * 2));
        assert_eq!(job.id(), TaskId::new(1));
        assert_eq!(job.run(), FutureState::Resolved);
        assert_eq!(fut.wait().unwrap(), 42);
    }

    #[test]
    fn test_run_catches_panic() {
        let (job, fut) = TaskJob::new(TaskId::new(2), Task::<u8>::from_fn(|| panic!("kaboom")));
        assert_eq!(job.run(), FutureState::Failed);
        let err = fut.wait().unwrap_err();
        let task_err = err.task_error().unwrap();
        assert_eq!(task_err.kind(), TaskErrorKind::Panicked);
        assert_eq!(task_err.message(), "kaboom");
    }

    #[test]
    fn test_cancelled_error_cancels_future() {
        let task = Task::with_token(|tok| {
            tok.set();
            tok.check()?;
            Ok::<u8, PoolError>(1)
        });
        let (job, fut) = TaskJob::new(TaskId::new(3), task);
        assert_eq!(job.run(), FutureState::Cancelled);
        assert!(fut.is_cancelled());
    }

    #[test]
    fn test_cancel_skips_body() {
        let (job, fut) = TaskJob::new(TaskId::new(4), Task::<u8>::from_fn(|| unreachable!()));
        assert!(!job.is_settled());
        assert_eq!(job.cancel(), FutureState::Cancelled);
        assert!(matches!(fut.wait(), Err(PoolError::Cancelled)));
    }

    #[test]
    fn test_abort_handle_discards_late_result() {
        let (job, fut) = TaskJob::new(TaskId::new(6), Task::with_token(|tok| {
            Ok::<bool, PoolError>(tok.is_set())
        }));
        let abort = job.abort_handle();
        assert!(abort.abort());
        assert!(!abort.abort());

        assert!(fut.is_cancelled());
        assert_eq!(job.run(), FutureState::Cancelled);
    }

    #[test]
    fn test_settled_through_handle() {
        let (job, fut) = TaskJob::new(TaskId::new(5), Task::from_fn(|| 1u8));
        fut.cancel();
        assert!(job.is_settled());
        // Running anyway cannot overwrite the first outcome
        assert_eq!(job.run(), FutureState::Cancelled);
    }
}
