//! Error types for the workpool engine

use core::fmt;
use std::error::Error as StdError;
use std::sync::Arc;

/// Result type for engine operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Boxed error accepted from task bodies
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by the engine
///
/// Engine errors (`QueueClosed`, `PoolNotRunning`, ...) are returned
/// directly to the caller of `submit`/`put`. Failures of task bodies only
/// ever reach callers through a `TaskFuture` as `Task(..)`.
#[derive(Debug, Clone)]
pub enum PoolError {
    /// `put` attempted after the queue was closed
    QueueClosed,

    /// Queue is at capacity (non-blocking variants only)
    QueueFull,

    /// `submit` attempted outside the Running state
    PoolNotRunning,

    /// Waiter-side deadline exceeded; the task itself keeps running
    Timeout,

    /// Future ended in the Cancelled state
    Cancelled,

    /// The task body returned an error or panicked
    Task(TaskError),

    /// Invalid pool or config parameter
    InvalidConfig(&'static str),

    /// Worker backend could not start a worker
    SpawnFailed(String),

    /// Semaphore released more times than it was acquired
    PermitOverflow,

    /// The resolved value was already moved out through `TaskFuture::take`
    ResultTaken,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::QueueClosed => write!(f, "queue closed"),
            PoolError::QueueFull => write!(f, "queue full"),
            PoolError::PoolNotRunning => write!(f, "pool not running"),
            PoolError::Timeout => write!(f, "operation timed out"),
            PoolError::Cancelled => write!(f, "task cancelled"),
            PoolError::Task(e) => write!(f, "task error: {}", e),
            PoolError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            PoolError::SpawnFailed(msg) => write!(f, "failed to spawn worker: {}", msg),
            PoolError::PermitOverflow => write!(f, "semaphore released above its capacity"),
            PoolError::ResultTaken => write!(f, "task result already taken"),
        }
    }
}

impl StdError for PoolError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PoolError::Task(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TaskError> for PoolError {
    fn from(e: TaskError) -> Self {
        PoolError::Task(e)
    }
}

impl PoolError {
    /// Check for the cancellation outcome
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PoolError::Cancelled)
    }

    /// Check for a waiter-side timeout
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout)
    }

    /// Borrow the wrapped task error, if any
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            PoolError::Task(e) => Some(e),
            _ => None,
        }
    }
}

/// How a task body failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskErrorKind {
    /// Body returned `Err`
    Failed,
    /// Body panicked; caught at the worker boundary
    Panicked,
}

/// Failure of a task body
///
/// Wraps the body's original error without loss: `message()` is its
/// `Display` text and `source()` returns the original error. The error is
/// reference-counted so every reader of a future sees the same value.
#[derive(Clone)]
pub struct TaskError {
    kind: TaskErrorKind,
    message: String,
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl TaskError {
    /// Wrap an error returned by a task body
    pub fn from_error(err: BoxError) -> Self {
        Self {
            kind: TaskErrorKind::Failed,
            message: err.to_string(),
            source: Some(Arc::from(err)),
        }
    }

    /// Build a failure from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            kind: TaskErrorKind::Failed,
            message: message.into(),
            source: None,
        }
    }

    /// Build a failure from a caught panic payload
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };
        Self {
            kind: TaskErrorKind::Panicked,
            message,
            source: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> TaskErrorKind {
        self.kind
    }

    /// Original error text
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attempt to view the original error as a concrete type
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TaskErrorKind::Failed => write!(f, "{}", self.message),
            TaskErrorKind::Panicked => write!(f, "panicked: {}", self.message),
        }
    }
}

impl StdError for TaskError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.source {
            Some(e) => Some(e.as_ref() as &(dyn StdError + 'static)),
            None => None,
        }
    }
}

/// Error returned by `BoundedQueue::try_put`, handing the item back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryPutError<T> {
    /// Queue at capacity
    Full(T),
    /// Queue closed
    Closed(T),
}

impl<T> TryPutError<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        match self {
            TryPutError::Full(v) | TryPutError::Closed(v) => v,
        }
    }
}

impl<T> fmt::Display for TryPutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPutError::Full(_) => write!(f, "queue full"),
            TryPutError::Closed(_) => write!(f, "queue closed"),
        }
    }
}

impl<T> From<TryPutError<T>> for PoolError {
    fn from(e: TryPutError<T>) -> Self {
        match e {
            TryPutError::Full(_) => PoolError::QueueFull,
            TryPutError::Closed(_) => PoolError::QueueClosed,
        }
    }
}
