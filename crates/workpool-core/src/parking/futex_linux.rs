//! Linux futex-based parking
//!
//! Futex word semantics: the word is an epoch counter. Waiters sleep
//! with FUTEX_WAIT on the epoch they observed; notifiers increment the
//! epoch before FUTEX_WAKE, so a waiter that observed an old epoch never
//! goes to sleep.

use super::Parking;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Linux futex-based parking
pub struct FutexParking {
    /// Futex word: wake epoch
    futex: AtomicU32,

    /// Count of registered waiters (skips the wake syscall when zero)
    parked: AtomicUsize,
}

impl FutexParking {
    pub const fn new() -> Self {
        Self {
            futex: AtomicU32::new(0),
            parked: AtomicUsize::new(0),
        }
    }

    fn wake(&self, count: i32) {
        self.futex.fetch_add(1, Ordering::SeqCst);

        if self.parked.load(Ordering::SeqCst) == 0 {
            return;
        }

        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexParking {
    fn default() -> Self {
        Self::new()
    }
}

impl Parking for FutexParking {
    fn prepare_park(&self) -> u32 {
        self.parked.fetch_add(1, Ordering::SeqCst);
        self.futex.load(Ordering::SeqCst)
    }

    fn park(&self, epoch: u32, timeout: Option<Duration>) {
        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });

        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // FUTEX_WAIT: sleep only if the word still holds `epoch`.
        // ETIMEDOUT, EAGAIN and EINTR all mean "re-check and maybe retry",
        // which the caller does anyway.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                epoch,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }

        self.parked.fetch_sub(1, Ordering::SeqCst);
    }

    fn cancel_park(&self) {
        self.parked.fetch_sub(1, Ordering::SeqCst);
    }

    fn unpark_one(&self) {
        self.wake(1);
    }

    fn unpark_all(&self) {
        self.wake(i32::MAX);
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
