//! Task identifier type

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Sequence number of a submitted task
///
/// Assigned by the pool at submission time from a per-pool counter, so
/// ids are strictly increasing in submission order. The maximum value is
/// reserved as a sentinel for "no task".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Sentinel value indicating no task
    pub const NONE: TaskId = TaskId(u64::MAX);

    #[inline]
    pub const fn new(seq: u64) -> Self {
        TaskId(seq)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u64::MAX
    }

    /// Convert to Option
    #[inline]
    pub const fn to_option(self) -> Option<TaskId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u64> for TaskId {
    #[inline]
    fn from(seq: u64) -> Self {
        TaskId(seq)
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "TaskId(NONE)")
        } else {
            write!(f, "TaskId({})", self.0)
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "-")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Monotonic id source owned by a pool instance
#[derive(Debug, Default)]
pub struct TaskIdGen {
    next: AtomicU64,
}

impl TaskIdGen {
    pub const fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    /// Hand out the next sequence number
    #[inline]
    pub fn next(&self) -> TaskId {
        TaskId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel() {
        assert!(TaskId::NONE.is_none());
        assert!(TaskId::NONE.to_option().is_none());
        assert_eq!(TaskId::new(7).to_option(), Some(TaskId::new(7)));
    }

    #[test]
    fn test_gen_is_monotonic() {
        let gen = TaskIdGen::new();
        let a = gen.next();
        let b = gen.next();
        let c = gen.next();
        assert!(a < b && b < c);
        assert_eq!(gen.issued(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TaskId::new(3)), "#3");
        assert_eq!(format!("{:?}", TaskId::NONE), "TaskId(NONE)");
    }
}
