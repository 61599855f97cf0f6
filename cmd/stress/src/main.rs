//! Stress test - many small tasks from several producers
//!
//! Usage: `stress [tasks] [producers]`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use workpool::{PoolConfig, PoolState, Task, WorkerPool};

fn main() {
    println!("=== workpool stress test ===\n");

    let mut args = std::env::args().skip(1);
    let num_tasks: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let producers: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(4).max(1);

    let config = PoolConfig::from_env().queue_capacity(256);
    config.print();
    let pool = match WorkerPool::with_config(config) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            eprintln!("cannot start pool: {}", e);
            std::process::exit(1);
        }
    };

    let checksum = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let pool = Arc::clone(&pool);
            let checksum = Arc::clone(&checksum);
            thread::spawn(move || {
                let mut rejected = 0u64;
                for i in (p..num_tasks).step_by(producers as usize) {
                    let checksum = Arc::clone(&checksum);
                    let task = Task::from_fn(move || {
                        checksum.fetch_add(i, Ordering::Relaxed);
                    });
                    if pool.submit(task).is_err() {
                        rejected += 1;
                    }
                }
                rejected
            })
        })
        .collect();

    let rejected: u64 = handles.into_iter().map(|h| h.join().unwrap_or(0)).sum();
    let submit_time = start.elapsed();
    println!("\nsubmitted {} tasks in {:?} ({} rejected)", num_tasks, submit_time, rejected);

    if !pool.wait_idle(Some(Duration::from_secs(60))) {
        println!("timeout waiting for tasks: {}", pool.stats());
    }
    let total_time = start.elapsed();
    pool.shutdown(true);

    let stats = pool.stats();
    let expected: u64 = (0..num_tasks).sum();
    println!("\n=== Results ===");
    println!("Stats:       {}", stats);
    println!("Checksum:    {} (expected {})", checksum.load(Ordering::Relaxed), expected);
    println!("Total time:  {:?}", total_time);
    println!(
        "Throughput:  {:.0} tasks/sec",
        stats.completed as f64 / total_time.as_secs_f64()
    );
    println!("Final state: {}", pool.state());

    let ok = stats.completed == num_tasks && pool.state() == PoolState::Stopped;
    println!("\n{}", if ok { "PASS" } else { "FAIL" });
    if !ok {
        std::process::exit(1);
    }
}
