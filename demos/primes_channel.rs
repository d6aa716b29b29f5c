//! Finding primes from a producer channel
//!
//! A producer thread feeds 1..=N into a bounded channel; the pool keeps the
//! primes and skips everything else. Compare against a single worker by
//! passing `1` as the first argument.
//!
//! Run with: cargo run --release --example primes_channel -- [workers] [n]

use crossbeam::channel;
use fanout_pool::prelude::*;
use std::thread;
use std::time::Instant;

/// Deliberately naive trial division, just something to keep workers busy
fn is_prime(number: u64) -> bool {
    if number <= 1 {
        return false;
    }
    (2..number).rev().all(|i| number % i != 0)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let workers = args
        .next()
        .and_then(|a| a.parse().ok())
        .unwrap_or_else(num_cpus::get);
    let size_to_check: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(100_000);

    println!("=== fanout_pool - Primes Example ===\n");
    println!("Checking 1..={} on {} worker(s)", size_to_check, workers);

    let (tx, rx) = channel::bounded(workers.max(1));
    let producer = thread::spawn(move || {
        for i in 1..=size_to_check {
            if tx.send(i).is_err() {
                break;
            }
        }
    });

    let start = Instant::now();
    let token = CancellationToken::new();
    let mut stream = run_from_producer(
        &token,
        rx,
        NamedCallback::new("is_prime", |_: &CancellationToken, n: u64| {
            is_prime(n).then(|| JobResult::success(n))
        }),
        workers,
    )?;

    let mut primes = Vec::new();
    for result in stream.by_ref() {
        match result {
            JobResult::Success(n) => primes.push(n),
            other => return Err(PoolError::other(format!("unexpected result: {:?}", other))),
        }
    }
    let elapsed = start.elapsed();

    if producer.join().is_err() {
        return Err(PoolError::other("producer thread panicked"));
    }

    // Completion order, not numeric order
    println!("{:?}", primes);
    println!(
        "\nFound {} primes in {:.3}s",
        primes.len(),
        elapsed.as_secs_f64()
    );
    println!("{:#?}", stream.stats());

    Ok(())
}
