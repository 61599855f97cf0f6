//! Future and pool lifecycle states

use core::fmt;

/// State of a `TaskFuture`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FutureState {
    /// Task not yet finished (queued or running)
    Pending = 0,

    /// Body returned a value
    Resolved = 1,

    /// Body returned an error or panicked
    Failed = 2,

    /// Cancelled before or during execution
    Cancelled = 3,
}

impl FutureState {
    /// Check if the future reached a terminal state
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, FutureState::Pending)
    }
}

impl From<u8> for FutureState {
    fn from(v: u8) -> Self {
        match v {
            1 => FutureState::Resolved,
            2 => FutureState::Failed,
            3 => FutureState::Cancelled,
            _ => FutureState::Pending,
        }
    }
}

impl fmt::Display for FutureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureState::Pending => write!(f, "PENDING"),
            FutureState::Resolved => write!(f, "RESOLVED"),
            FutureState::Failed => write!(f, "FAILED"),
            FutureState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Lifecycle of a `WorkerPool`
///
/// Transitions are one-directional:
/// `Created -> Running -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PoolState {
    /// Constructed, workers not yet started
    Created = 0,

    /// Accepting submissions
    Running = 1,

    /// Shutdown begun; queued tasks still processed (or cancelled)
    Draining = 2,

    /// All workers exited
    Stopped = 3,
}

impl PoolState {
    /// Only a running pool accepts new tasks
    #[inline]
    pub const fn accepts_submissions(&self) -> bool {
        matches!(self, PoolState::Running)
    }

    /// Check whether `next` is a legal successor of `self`
    #[inline]
    pub fn can_transition_to(&self, next: PoolState) -> bool {
        (next as u8) == (*self as u8) + 1
    }
}

impl From<u8> for PoolState {
    fn from(v: u8) -> Self {
        match v {
            0 => PoolState::Created,
            1 => PoolState::Running,
            2 => PoolState::Draining,
            _ => PoolState::Stopped,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Created => write!(f, "CREATED"),
            PoolState::Running => write!(f, "RUNNING"),
            PoolState::Draining => write!(f, "DRAINING"),
            PoolState::Stopped => write!(f, "STOPPED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_terminal() {
        assert!(!FutureState::Pending.is_terminal());
        assert!(FutureState::Resolved.is_terminal());
        assert!(FutureState::Failed.is_terminal());
        assert!(FutureState::Cancelled.is_terminal());
    }

    #[test]
    fn test_future_from_u8() {
        for s in [
            FutureState::Pending,
            FutureState::Resolved,
            FutureState::Failed,
            FutureState::Cancelled,
        ] {
            assert_eq!(FutureState::from(s as u8), s);
        }
    }

    #[test]
    fn test_pool_transitions() {
        assert!(PoolState::Created.can_transition_to(PoolState::Running));
        assert!(PoolState::Running.can_transition_to(PoolState::Draining));
        assert!(PoolState::Draining.can_transition_to(PoolState::Stopped));

        assert!(!PoolState::Running.can_transition_to(PoolState::Created));
        assert!(!PoolState::Running.can_transition_to(PoolState::Stopped));
        assert!(!PoolState::Stopped.can_transition_to(PoolState::Running));
    }

    #[test]
    fn test_only_running_accepts() {
        assert!(PoolState::Running.accepts_submissions());
        assert!(!PoolState::Created.accepts_submissions());
        assert!(!PoolState::Draining.accepts_submissions());
        assert!(!PoolState::Stopped.accepts_submissions());
    }
}
