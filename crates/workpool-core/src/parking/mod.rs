//! Thread parking
//!
//! Every blocking point in the engine (queue put/get, future get,
//! semaphore acquire, event wait, mutex contention) sleeps through this
//! module. Platform-specific implementations use the most efficient
//! primitive available.
//!
//! Parking is epoch based. A waiter snapshots the epoch with
//! `prepare_park()`, re-checks its condition, then sleeps only while the
//! epoch is unchanged. A notifier first makes its condition true, then
//! bumps the epoch and wakes. A notification that lands between the
//! re-check and the sleep changes the epoch, so the sleep returns
//! immediately and no wakeup is lost.

use std::time::{Duration, Instant};

/// Platform-specific parking mechanism
pub trait Parking: Send + Sync {
    /// Register as a waiter and return the current epoch
    ///
    /// Must be followed by exactly one `park()` or `cancel_park()`.
    fn prepare_park(&self) -> u32;

    /// Sleep while the epoch still equals `epoch`, or until timeout
    ///
    /// May return spuriously. Callers re-check their condition.
    fn park(&self, epoch: u32, timeout: Option<Duration>);

    /// Withdraw a registration made by `prepare_park()` without sleeping
    fn cancel_park(&self);

    /// Bump the epoch and wake one parked thread
    fn unpark_one(&self);

    /// Bump the epoch and wake every parked thread
    fn unpark_all(&self);

    /// Number of currently parked threads (hint, may be stale)
    fn parked_count(&self) -> usize;
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::FallbackParking as PlatformParking;
    }
}

/// Block until `ready()` returns true or `deadline` passes
///
/// Returns `true` if the condition was observed, `false` on timeout.
/// `ready` is evaluated on the calling thread and may be called several
/// times; it must be cheap and side-effect free unless it succeeds.
pub fn park_until<P, F>(parking: &P, deadline: Option<Instant>, mut ready: F) -> bool
where
    P: Parking + ?Sized,
    F: FnMut() -> bool,
{
    loop {
        if ready() {
            return true;
        }

        let epoch = parking.prepare_park();
        if ready() {
            parking.cancel_park();
            return true;
        }

        let timeout = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    parking.cancel_park();
                    return false;
                }
                Some(deadline - now)
            }
            None => None,
        };

        parking.park(epoch, timeout);
    }
}

/// Convert an optional relative timeout into an absolute deadline
#[inline]
pub fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_park_until_timeout() {
        let parking = PlatformParking::new();
        let start = Instant::now();
        let ok = park_until(&parking, deadline_after(Some(Duration::from_millis(50))), || false);
        let elapsed = start.elapsed();

        assert!(!ok);
        assert!(elapsed >= Duration::from_millis(40));
        assert_eq!(parking.parked_count(), 0);
    }

    #[test]
    fn test_park_until_ready_immediately() {
        let parking = PlatformParking::new();
        assert!(park_until(&parking, None, || true));
        assert_eq!(parking.parked_count(), 0);
    }

    #[test]
    fn test_unpark_wakes_waiter() {
        let parking = Arc::new(PlatformParking::new());
        let flag = Arc::new(AtomicBool::new(false));

        let handle = {
            let parking = Arc::clone(&parking);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                park_until(
                    parking.as_ref(),
                    deadline_after(Some(Duration::from_secs(10))),
                    || flag.load(Ordering::Acquire),
                )
            })
        };

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        flag.store(true, Ordering::Release);
        parking.unpark_all();

        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stale_epoch_does_not_sleep() {
        let parking = PlatformParking::new();
        let epoch = parking.prepare_park();
        parking.unpark_one();

        let start = Instant::now();
        parking.park(epoch, Some(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
