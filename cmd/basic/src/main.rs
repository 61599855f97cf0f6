//! Basic workpool walkthrough
//!
//! Simulated downloads on a small pool: results in input order, a shared
//! counter behind the engine mutex, a semaphore capping concurrent
//! "connections", a failing task, a batch deadline, and a stop token.
//!
//! # Environment Variables
//!
//! - `WP_LOG_LEVEL=debug` - Show worker lifecycle (off, error, warn, info, debug, trace)
//! - `WP_FLUSH_EPRINT=1` - Flush log output immediately

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use workpool::{kinfo, BroadcastEvent, CountingSemaphore, Mutex, PoolConfig, PoolError, Runtime, Task};

// WP_LOG_LEVEL=debug cargo run -p workpool-basic
fn fake_download(url: &str) -> usize {
    thread::sleep(Duration::from_millis(20 + (url.len() as u64 % 5) * 10));
    url.len() * 100
}

fn main() -> Result<(), PoolError> {
    println!("=== workpool basic example ===\n");

    let config = PoolConfig::from_env().num_workers(4).queue_capacity(4);
    let runtime = Runtime::new(config);

    let urls: Vec<String> = (1..=8).map(|i| format!("https://example.com/file{}.bin", i)).collect();

    runtime.block_on(|sched| -> Result<(), PoolError> {
        // 1. Batch with results in input order
        let start = Instant::now();
        let sizes = sched.run_all(urls.iter().cloned().map(|u| Task::from_fn(move || fake_download(&u))))?;
        for (url, size) in urls.iter().zip(&sizes) {
            println!("  {:<36} {:?}", url, size);
        }
        println!("batch of {} took {:?}\n", urls.len(), start.elapsed());

        // 2. Shared counter under the engine mutex
        let total = Arc::new(Mutex::new(0usize));
        let futures = sched.map(urls.iter().cloned().map(|u| {
            let total = Arc::clone(&total);
            Task::from_fn(move || *total.lock() += fake_download(&u))
        }))?;
        for f in &futures {
            f.wait()?;
        }
        println!("total bytes: {}\n", *total.lock());

        // 3. At most two downloads at once, even with four workers
        let connections = Arc::new(CountingSemaphore::new(2));
        let futures = sched.map(urls.iter().take(4).cloned().map(|u| {
            let connections = Arc::clone(&connections);
            Task::from_fn(move || {
                let _permit = connections.permit();
                kinfo!("downloading {} ({} slot(s) left)", u, connections.available());
                fake_download(&u)
            })
        }))?;
        for f in &futures {
            f.wait()?;
        }
        println!("bounded downloads finished\n");

        // 4. A failing task surfaces through its future only
        let bad = sched.submit(Task::new(|| {
            Err::<usize, _>(std::io::Error::new(std::io::ErrorKind::NotFound, "404 not found"))
        }))?;
        match bad.wait() {
            Err(e) => println!("failed as expected: {}\n", e),
            Ok(v) => println!("unexpected success: {}\n", v),
        }

        // 5. One deadline for the whole batch
        let slow = vec![
            Task::from_fn(|| fake_download("quick")),
            Task::from_fn(|| {
                thread::sleep(Duration::from_millis(300));
                0
            }),
        ];
        for (i, r) in sched.run_with_timeout(slow, Duration::from_millis(100))?.iter().enumerate() {
            println!("  deadline batch[{}]: {:?}", i, r);
        }
        println!();

        // 6. Stop a batch of pollers with one event
        let stop = BroadcastEvent::new();
        let trigger = {
            let stop = stop.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                stop.set();
            })
        };
        let pollers = (0..3).map(|i| {
            move |tok: &BroadcastEvent| -> Result<u32, PoolError> {
                let mut ticks = 0;
                loop {
                    tok.check()?;
                    ticks += 1;
                    if ticks > 1_000 {
                        return Ok(i);
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            }
        });
        let results = sched.run_with_cancellation_token(&stop, pollers)?;
        let _ = trigger.join();
        println!("pollers: {:?}", results);
        println!("stats:   {}", sched.pool().stats());
        Ok(())
    })??;

    println!("\n=== example complete ===");
    Ok(())
}
