//! Parking mutex
//!
//! Guards the engine's shared state (pool counters, future slots,
//! worker registries). Uncontended lock/unlock is a single CAS; a
//! contended locker spins briefly and then parks instead of burning CPU.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};
use crate::parking::{park_until, Parking, PlatformParking};

/// Spins before a contended locker parks
const SPIN_LIMIT: u32 = 64;

/// A mutex that parks the OS thread when contended
///
/// Unlike `std::sync::Mutex` there is no poisoning: a panic while the
/// guard is held simply releases the lock during unwinding.
///
/// # Example
///
/// ```ignore
/// let counters = Mutex::new(0u64);
/// {
///     let mut guard = counters.lock();
///     *guard += 1;
/// } // Guard dropped, mutex unlocked
/// ```
pub struct Mutex<T> {
    /// Lock state
    locked: AtomicBool,

    /// Protected data
    data: UnsafeCell<T>,

    /// Contended lockers wait here
    waiters: PlatformParking,
}

// Safety: Mutex provides exclusive access to T
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Create a new mutex containing the given value
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
            waiters: PlatformParking::new(),
        }
    }

    /// Acquire the lock, parking if contended
    ///
    /// Returns a guard that releases the lock when dropped.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        // Fast path: try to acquire immediately
        if let Some(guard) = self.try_lock() {
            return guard;
        }

        self.lock_slow()
    }

    #[cold]
    fn lock_slow(&self) -> MutexGuard<'_, T> {
        for _ in 0..SPIN_LIMIT {
            if !self.locked.load(Ordering::Relaxed) {
                if let Some(guard) = self.try_lock() {
                    return guard;
                }
            }
            std::hint::spin_loop();
        }

        loop {
            park_until(&self.waiters, None, || !self.locked.load(Ordering::Acquire));
            if let Some(guard) = self.try_lock() {
                return guard;
            }
        }
    }

    /// Try to acquire the lock without blocking
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(MutexGuard {
                mutex: self,
                _marker: PhantomData,
            })
        } else {
            None
        }
    }

    /// Check if the mutex is currently locked
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Get mutable access to the underlying data
    ///
    /// This requires mutable access to the mutex, guaranteeing no other
    /// references exist.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consume the mutex and return the inner value
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
        // Always bump the epoch: the parked count alone can be stale.
        self.waiters.unpark_one();
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Mutex").field("data", &*guard).finish(),
            None => f.debug_struct("Mutex").field("data", &"<locked>").finish(),
        }
    }
}

/// Guard that releases the mutex when dropped
///
/// Shared references to the guard hand out `&T`, so the guard is only
/// `Sync` when `T` is:
///
/// ```compile_fail
/// use std::cell::Cell;
/// use workpool_core::Mutex;
///
/// fn assert_sync<S: Sync>(_: &S) {}
///
/// let mutex = Mutex::new(Cell::new(0u64));
/// assert_sync(&mutex.lock());
/// ```
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> Deref for MutexGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: We hold the lock
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: We hold the lock
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
