//! Fallback parking using std::sync::Condvar
//!
//! Used on platforms without futex support.
//! Less efficient but portable.

use super::Parking;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Condvar-based parking (fallback)
pub struct FallbackParking {
    /// Wake epoch
    epoch: Mutex<u32>,

    condvar: Condvar,

    /// Count of registered waiters
    parked: AtomicUsize,
}

impl FallbackParking {
    pub const fn new() -> Self {
        Self {
            epoch: Mutex::new(0),
            condvar: Condvar::new(),
            parked: AtomicUsize::new(0),
        }
    }

    fn bump(&self) {
        let mut guard = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = guard.wrapping_add(1);
    }
}

impl Default for FallbackParking {
    fn default() -> Self {
        Self::new()
    }
}

impl Parking for FallbackParking {
    fn prepare_park(&self) -> u32 {
        self.parked.fetch_add(1, Ordering::SeqCst);
        *self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn park(&self, epoch: u32, timeout: Option<Duration>) {
        let guard = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        if *guard == epoch {
            match timeout {
                Some(t) => {
                    let _ = self
                        .condvar
                        .wait_timeout(guard, t)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => {
                    let _ = self.condvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        self.parked.fetch_sub(1, Ordering::SeqCst);
    }

    fn cancel_park(&self) {
        self.parked.fetch_sub(1, Ordering::SeqCst);
    }

    fn unpark_one(&self) {
        self.bump();
        if self.parked.load(Ordering::SeqCst) > 0 {
            self.condvar.notify_one();
        }
    }

    fn unpark_all(&self) {
        self.bump();
        if self.parked.load(Ordering::SeqCst) > 0 {
            self.condvar.notify_all();
        }
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
