//! Counting semaphore
//!
//! Bounds concurrent access to one specific resource independently of
//! pool size: a pool of 4 workers can still allow at most 2 tasks at a
//! time inside a guarded section.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use crate::error::{PoolError, PoolResult};
use crate::parking::{deadline_after, park_until, Parking, PlatformParking};

/// Semaphore with a fixed number of permits
///
/// Invariant: `0 <= available() <= capacity()` at all times.
pub struct CountingSemaphore {
    /// Free permits
    available: AtomicUsize,

    /// Total permits
    capacity: usize,

    /// Threads blocked in acquire
    waiters: PlatformParking,
}

impl CountingSemaphore {
    /// Create a semaphore with `capacity` free permits
    pub const fn new(capacity: usize) -> Self {
        Self {
            available: AtomicUsize::new(capacity),
            capacity,
            waiters: PlatformParking::new(),
        }
    }

    /// Take a permit without blocking
    pub fn try_acquire(&self) -> bool {
        let mut current = self.available.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            match self.available.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Take a permit, blocking while none is free
    pub fn acquire(&self) {
        park_until(&self.waiters, None, || self.try_acquire());
    }

    /// Take a permit, giving up after `timeout`
    ///
    /// Returns `true` if a permit was taken.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        park_until(&self.waiters, deadline_after(Some(timeout)), || self.try_acquire())
    }

    /// Return a permit and wake one waiter
    ///
    /// Fails with `PermitOverflow` if every permit is already free.
    pub fn release(&self) -> PoolResult<()> {
        let mut current = self.available.load(Ordering::Relaxed);
        loop {
            if current >= self.capacity {
                return Err(PoolError::PermitOverflow);
            }
            match self.available.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.waiters.unpark_one();
        Ok(())
    }

    /// Acquire and return a guard that releases on drop
    ///
    /// The `with semaphore:` pattern:
    /// ```ignore
    /// let _permit = sem.permit();
    /// // ... at most `capacity` threads here ...
    /// ```
    pub fn permit(&self) -> SemaphorePermit<'_> {
        self.acquire();
        SemaphorePermit { sem: self }
    }

    /// Non-blocking variant of `permit()`
    pub fn try_permit(&self) -> Option<SemaphorePermit<'_>> {
        if self.try_acquire() {
            Some(SemaphorePermit { sem: self })
        } else {
            None
        }
    }

    /// Free permits right now (hint)
    #[inline]
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for CountingSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingSemaphore")
            .field("available", &self.available())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Permit held until dropped
pub struct SemaphorePermit<'a> {
    sem: &'a CountingSemaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        // A live permit always has a matching acquire, so this cannot overflow.
        let _ = self.sem.release();
    }
}
