//! Bounded blocking FIFO queue
//!
//! Storage is a lock-free `crossbeam_queue::ArrayQueue`; parking is only
//! used when a producer finds the queue full or a consumer finds it empty.
//! This is the engine's flow-control point: a full queue blocks `put`,
//! which is what gives `WorkerPool::submit` its backpressure.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use crossbeam_queue::ArrayQueue;
use crate::error::{PoolError, PoolResult, TryPutError};
use crate::parking::{deadline_after, park_until, Parking, PlatformParking};

/// Thread-safe FIFO with bounded capacity and a close signal
///
/// - `len() <= capacity()` at all times.
/// - Once closed, `put` never succeeds; `get` keeps returning queued
///   items until the queue is drained, then returns `None` without
///   blocking.
pub struct BoundedQueue<T> {
    /// Ring buffer of items
    items: ArrayQueue<T>,

    /// Closed flag (monotonic)
    closed: AtomicBool,

    /// Producers between their closed-check and their push
    putters: AtomicUsize,

    /// Producers waiting for space
    not_full: PlatformParking,

    /// Consumers waiting for items
    not_empty: PlatformParking,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// Fails with `InvalidConfig` when `capacity == 0`.
    pub fn new(capacity: usize) -> PoolResult<Self> {
        if capacity == 0 {
            return Err(PoolError::InvalidConfig("queue capacity must be >= 1"));
        }
        Ok(Self {
            items: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
            putters: AtomicUsize::new(0),
            not_full: PlatformParking::new(),
            not_empty: PlatformParking::new(),
        })
    }

    /// Append an item, blocking while the queue is full
    ///
    /// Returns `Err(QueueClosed)` if the queue is (or becomes) closed
    /// before the item could be stored; the item is dropped.
    pub fn put(&self, item: T) -> PoolResult<()> {
        self.put_until(item, None).map_err(PoolError::from)
    }

    /// Append an item, giving up after `timeout`
    ///
    /// On failure the item is handed back inside the error:
    /// `Full` means the deadline passed, `Closed` means the queue closed.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), TryPutError<T>> {
        self.put_until(item, deadline_after(Some(timeout)))
    }

    /// Append an item without blocking
    pub fn try_put(&self, item: T) -> Result<(), TryPutError<T>> {
        self.putters.fetch_add(1, Ordering::SeqCst);
        let result = if self.is_closed() {
            Err(TryPutError::Closed(item))
        } else {
            self.items.push(item).map_err(TryPutError::Full)
        };
        self.leave_put();

        if result.is_ok() {
            self.not_empty.unpark_one();
        }
        result
    }

    fn put_until(&self, item: T, deadline: Option<Instant>) -> Result<(), TryPutError<T>> {
        let mut pending = Some(item);
        let mut closed = false;

        self.putters.fetch_add(1, Ordering::SeqCst);
        park_until(&self.not_full, deadline, || {
            if self.is_closed() {
                closed = true;
                return true;
            }
            match pending.take() {
                Some(v) => match self.items.push(v) {
                    Ok(()) => true,
                    Err(v) => {
                        pending = Some(v);
                        false
                    }
                },
                None => true,
            }
        });
        self.leave_put();

        match pending {
            None => {
                self.not_empty.unpark_one();
                Ok(())
            }
            Some(v) if closed => Err(TryPutError::Closed(v)),
            Some(v) => Err(TryPutError::Full(v)),
        }
    }

    fn leave_put(&self) {
        // The last producer to leave a closed queue releases consumers
        // waiting to observe "closed and drained".
        if self.putters.fetch_sub(1, Ordering::SeqCst) == 1 && self.is_closed() {
            self.not_empty.unpark_all();
        }
    }

    /// Remove the head item, blocking while the queue is empty and open
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn get(&self) -> Option<T> {
        self.get_until(None).unwrap_or(None)
    }

    /// Like `get`, but fails with `Timeout` if nothing arrives in time
    pub fn get_timeout(&self, timeout: Duration) -> PoolResult<Option<T>> {
        self.get_until(deadline_after(Some(timeout)))
    }

    /// Remove the head item without blocking
    pub fn try_get(&self) -> Option<T> {
        let item = self.items.pop();
        if item.is_some() {
            self.not_full.unpark_one();
        }
        item
    }

    fn get_until(&self, deadline: Option<Instant>) -> PoolResult<Option<T>> {
        let mut out = None;
        let mut finished = false;

        let ready = park_until(&self.not_empty, deadline, || {
            if let Some(v) = self.items.pop() {
                out = Some(v);
                return true;
            }
            if self.is_closed() && self.putters.load(Ordering::SeqCst) == 0 {
                // A put may have landed between the pop above and the checks
                out = self.items.pop();
                finished = out.is_none();
                return true;
            }
            false
        });

        if !ready {
            return Err(PoolError::Timeout);
        }
        if out.is_some() {
            self.not_full.unpark_one();
        } else if finished {
            // Pass the news on; other consumers may be parked
            self.not_empty.unpark_all();
        }
        Ok(out)
    }

    /// Remove everything currently queued without blocking
    pub fn drain(&self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.items.len());
        while let Some(v) = self.items.pop() {
            drained.push(v);
        }
        if !drained.is_empty() {
            self.not_full.unpark_all();
        }
        drained
    }

    /// Close the queue and wake every blocked producer and consumer
    ///
    /// Idempotent. Returns `true` if this call closed the queue.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        if first {
            self.not_full.unpark_all();
            self.not_empty.unpark_all();
        }
        first
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current number of queued items
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            BoundedQueue::<u32>::new(0),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fifo_order() {
        let q = BoundedQueue::new(10).unwrap();
        for i in 0..5 {
            q.put(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(q.get(), Some(i));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_try_put_full() {
        let q = BoundedQueue::new(2).unwrap();
        q.try_put(1).unwrap();
        q.try_put(2).unwrap();

        assert_eq!(q.try_put(3), Err(TryPutError::Full(3)));
        assert_eq!(q.len(), 2);

        assert_eq!(q.try_get(), Some(1));
        q.try_put(3).unwrap();
    }

    #[test]
    fn test_put_after_close_fails() {
        let q = BoundedQueue::new(2).unwrap();
        assert!(q.close());
        assert!(!q.close());

        assert!(matches!(q.put(1), Err(PoolError::QueueClosed)));
        assert_eq!(q.try_put(2), Err(TryPutError::Closed(2)));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let q = BoundedQueue::new(4).unwrap();
        q.put("a").unwrap();
        q.put("b").unwrap();
        q.close();

        assert_eq!(q.get(), Some("a"));
        assert_eq!(q.get(), Some("b"));
        assert_eq!(q.get(), None);
        assert_eq!(q.get(), None);
    }

    #[test]
    fn test_get_timeout_on_empty() {
        let q = BoundedQueue::<u8>::new(1).unwrap();
        assert!(matches!(
            q.get_timeout(Duration::from_millis(10)),
            Err(PoolError::Timeout)
        ));
        q.close();
        assert!(matches!(q.get_timeout(Duration::from_millis(10)), Ok(None)));
    }

    #[test]
    fn test_put_timeout_returns_item() {
        let q = BoundedQueue::new(1).unwrap();
        q.put(1).unwrap();
        assert_eq!(
            q.put_timeout(2, Duration::from_millis(10)),
            Err(TryPutError::Full(2))
        );
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let q = Arc::new(BoundedQueue::<u32>::new(1).unwrap());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.get())
        };

        thread::sleep(Duration::from_millis(30));
        q.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_close_wakes_blocked_producer() {
        let q = Arc::new(BoundedQueue::new(1).unwrap());
        q.put(0).unwrap();

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.put(1))
        };

        thread::sleep(Duration::from_millis(30));
        q.close();
        assert!(matches!(producer.join().unwrap(), Err(PoolError::QueueClosed)));
        assert_eq!(q.get(), Some(0));
        assert_eq!(q.get(), None);
    }

    #[test]
    fn test_full_put_resumes_after_get() {
        let q = Arc::new(BoundedQueue::new(1).unwrap());
        q.put(1).unwrap();

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.put(2))
        };

        thread::sleep(Duration::from_millis(30));
        assert_eq!(q.len(), 1);
        assert_eq!(q.get(), Some(1));

        producer.join().unwrap().unwrap();
        assert_eq!(q.get(), Some(2));
    }

    #[test]
    fn test_drain() {
        let q = BoundedQueue::new(8).unwrap();
        for i in 0..5 {
            q.put(i).unwrap();
        }
        assert_eq!(q.drain(), vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_mpmc_no_loss() {
        let q = Arc::new(BoundedQueue::new(4).unwrap());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..250 {
                        q.put(p * 1000 + i).unwrap();
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(v) = q.get() {
                        assert!(q.len() <= q.capacity());
                        seen.push(v);
                    }
                    seen
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        q.close();

        let mut all: Vec<u32> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
