//! One-shot broadcast event
//!
//! Used both as a "stop everything" signal shared by many task bodies and
//! as the per-task cooperative cancellation flag. Once set it stays set:
//! there is no reset. Cancellation is cooperative only; a body that never
//! polls its event runs to completion.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crate::error::{PoolError, PoolResult};
use crate::parking::{deadline_after, park_until, Parking, PlatformParking};

/// Clonable handle to a one-shot flag
///
/// Clones share state: setting any clone releases every waiter on every
/// clone, current and future.
#[derive(Clone)]
pub struct BroadcastEvent {
    inner: Arc<EventInner>,
}

struct EventInner {
    set: AtomicBool,
    waiters: PlatformParking,
}

impl BroadcastEvent {
    /// Create a new, unset event
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventInner {
                set: AtomicBool::new(false),
                waiters: PlatformParking::new(),
            }),
        }
    }

    /// Set the event and wake all waiters
    ///
    /// Idempotent. Returns `true` if this call performed the transition.
    pub fn set(&self) -> bool {
        let first = !self.inner.set.swap(true, Ordering::AcqRel);
        if first {
            self.inner.waiters.unpark_all();
        }
        first
    }

    /// Check whether the event has been set
    #[inline]
    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::Acquire)
    }

    /// Check if set and return `Err(Cancelled)` if so
    ///
    /// This is the typical polling pattern for long-running bodies:
    /// ```ignore
    /// fn body(token: &BroadcastEvent) -> PoolResult<u64> {
    ///     for chunk in chunks {
    ///         token.check()?;  // Returns Err(Cancelled) once set
    ///         // ... do one unit of work ...
    ///     }
    /// }
    /// ```
    #[inline]
    pub fn check(&self) -> PoolResult<()> {
        if self.is_set() {
            Err(PoolError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block until the event is set
    pub fn wait(&self) {
        park_until(&self.inner.waiters, None, || self.is_set());
    }

    /// Block until the event is set or `timeout` elapses
    ///
    /// Returns `true` if the event is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        park_until(&self.inner.waiters, deadline_after(Some(timeout)), || self.is_set())
    }

    /// Check whether two handles refer to the same event
    pub fn same_as(&self, other: &BroadcastEvent) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for BroadcastEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastEvent")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_basic_set() {
        let event = BroadcastEvent::new();

        assert!(!event.is_set());
        assert!(event.check().is_ok());

        assert!(event.set());
        assert!(event.is_set());
        assert!(matches!(event.check(), Err(PoolError::Cancelled)));
    }

    #[test]
    fn test_set_is_idempotent() {
        let event = BroadcastEvent::new();
        assert!(event.set());
        assert!(!event.set());
        assert!(event.is_set());
    }

    #[test]
    fn test_clone_shares_state() {
        let a = BroadcastEvent::new();
        let b = a.clone();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&BroadcastEvent::new()));

        a.set();
        assert!(b.is_set());
    }

    #[test]
    fn test_wakes_all_waiters() {
        let event = BroadcastEvent::new();
        let woken = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let event = event.clone();
                let woken = Arc::clone(&woken);
                thread::spawn(move || {
                    event.wait();
                    woken.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(30));
        assert_eq!(woken.load(Ordering::SeqCst), 0);

        event.set();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_future_waiters_return_immediately() {
        let event = BroadcastEvent::new();
        event.set();

        let start = Instant::now();
        event.wait();
        assert!(event.wait_timeout(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_timeout_expires() {
        let event = BroadcastEvent::new();
        let start = Instant::now();
        assert!(!event.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
