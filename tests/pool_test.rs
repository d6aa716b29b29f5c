//! End-to-end behaviour of slice and producer runs

use crossbeam::channel::{self, RecvTimeoutError};
use fanout_pool::prelude::*;
use std::collections::HashSet;
use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn doubled_unless_three(_: &CancellationToken, n: u32) -> Option<JobResult<u32>> {
    if n == 3 {
        None
    } else {
        Some(JobResult::success(n * 2))
    }
}

fn sorted_payloads(stream: ResultStream<u32>) -> Vec<u32> {
    let mut payloads: Vec<u32> = stream
        .map(|r| r.into_result().expect("unexpected failure"))
        .collect();
    payloads.sort_unstable();
    payloads
}

#[test]
fn test_doubling_scenario() {
    init_logging();
    let token = CancellationToken::new();
    let stream = run_from_slice(&token, vec![2, 3, 4], doubled_unless_three, 2)
        .expect("Failed to start run");

    assert_eq!(stream.worker_count(), 2);
    assert_eq!(sorted_payloads(stream), vec![4, 8]);
}

#[test]
fn test_empty_slice_closes_immediately() {
    let token = CancellationToken::new();
    let stream = run_from_slice(&token, Vec::<u32>::new(), doubled_unless_three, 4)
        .expect("Failed to start run");

    assert_eq!(stream.worker_count(), 0);
    assert!(matches!(
        stream.recv_timeout(Duration::from_secs(5)),
        Err(RecvTimeoutError::Disconnected)
    ));
}

#[test]
fn test_zero_workers_slice_closes_immediately() {
    let token = CancellationToken::new();
    let stream = run_from_slice(&token, vec![1u32, 2, 3], doubled_unless_three, 0)
        .expect("Failed to start run");

    assert_eq!(stream.worker_count(), 0);
    assert_eq!(stream.count(), 0);
}

#[test]
fn test_zero_workers_producer_closes_immediately() {
    let token = CancellationToken::new();
    let (tx, rx) = channel::bounded::<u32>(4);

    let stream = run_from_producer(&token, rx, doubled_unless_three, 0)
        .expect("Failed to start run");
    assert_eq!(stream.worker_count(), 0);
    assert_eq!(stream.count(), 0);

    // Nobody is left to receive
    assert!(tx.send(1).is_err());
}

#[test]
fn test_five_workers_two_items() {
    let token = CancellationToken::new();
    let stream = run_from_slice(&token, vec![10u32, 20], doubled_unless_three, 5)
        .expect("Failed to start run");

    assert_eq!(stream.worker_count(), 2);
    assert_eq!(sorted_payloads(stream), vec![20, 40]);
}

#[test]
fn test_every_item_panics() {
    init_logging();
    let token = CancellationToken::new();
    let items: Vec<u32> = (0..25).collect();
    let stream = run_from_slice(
        &token,
        items,
        NamedCallback::new("explode", |_: &CancellationToken, n: u32| -> Option<JobResult<u32>> {
            panic!("item {} exploded", n)
        }),
        4,
    )
    .expect("Failed to start run");

    let results: Vec<JobResult<u32>> = stream.collect();
    assert_eq!(results.len(), 25);

    let mut messages = HashSet::new();
    for result in &results {
        let panic = result.panic().expect("expected a contained panic");
        assert_eq!(panic.callback, "explode");
        assert!(panic.worker_id < 4);
        messages.insert(panic.message.clone());
        assert!(result.payload().is_none());
    }
    // One panic per item, none lost or duplicated
    assert_eq!(messages.len(), 25);
}

#[test]
fn test_non_string_panic_payloads_are_contained() {
    init_logging();
    let token = CancellationToken::new();
    let mut stream = run_from_slice(
        &token,
        0..20u32,
        |_: &CancellationToken, n: u32| -> Option<JobResult<u32>> {
            if n % 2 == 0 {
                panic::panic_any(n)
            } else {
                panic::resume_unwind(Box::new(vec![n]))
            }
        },
        3,
    )
    .expect("Failed to start run");

    let results: Vec<JobResult<u32>> = stream.by_ref().collect();
    assert_eq!(results.len(), 20);
    for result in &results {
        let panic = result.panic().expect("expected a contained panic");
        assert_eq!(panic.message, "Unknown panic");
        assert!(panic.worker_id < 3);
    }

    // Every worker survived and the stream closed
    assert!(matches!(
        stream.recv_timeout(Duration::from_secs(5)),
        Err(RecvTimeoutError::Disconnected)
    ));
    assert_eq!(stream.stats().results_panicked, 20);
}

#[test]
fn test_panic_does_not_stop_worker() {
    let token = CancellationToken::new();
    let stream = run_from_slice(
        &token,
        0..10u32,
        |_: &CancellationToken, n: u32| {
            if n == 0 {
                panic!("first item is poisoned");
            }
            Some(JobResult::success(n))
        },
        1,
    )
    .expect("Failed to start run");

    let results: Vec<JobResult<u32>> = stream.collect();
    assert_eq!(results.len(), 10);
    assert_eq!(results.iter().filter(|r| r.is_panic()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 9);
}

#[test]
fn test_reported_failures_are_delivered() {
    let token = CancellationToken::new();
    let stream = run_from_slice(
        &token,
        vec![1u32, 2, 3, 4],
        |_: &CancellationToken, n: u32| {
            let error = (n % 2 == 1).then(|| format!("{} is odd", n));
            Some(JobResult::new(error, n))
        },
        2,
    )
    .expect("Failed to start run");

    let results: Vec<JobResult<u32>> = stream.collect();
    assert_eq!(results.len(), 4);

    let mut failed: Vec<u32> = results
        .iter()
        .filter(|r| r.is_failure())
        .map(|r| *r.payload().unwrap())
        .collect();
    failed.sort_unstable();
    assert_eq!(failed, vec![1, 3]);
    assert!(results
        .iter()
        .filter_map(|r| r.error())
        .all(|e| e.to_string().ends_with("is odd")));
}

#[test]
fn test_same_multiset_across_runs() {
    let items: Vec<u32> = (0..200).collect();
    let token = CancellationToken::new();

    let first = sorted_payloads(
        run_from_slice(&token, items.clone(), doubled_unless_three, 7).unwrap(),
    );
    let second = sorted_payloads(
        run_from_slice(&token, items, doubled_unless_three, 3).unwrap(),
    );

    assert_eq!(first.len(), 199);
    assert_eq!(first, second);
}

#[test]
fn test_producer_channel_run() {
    let token = CancellationToken::new();
    let (tx, rx) = channel::bounded(4);

    let producer = thread::spawn(move || {
        for n in 1..=100u32 {
            tx.send(n).expect("pool stopped receiving");
        }
    });

    let stream = run_from_producer(
        &token,
        rx,
        |_: &CancellationToken, n: u32| (n % 10 == 0).then(|| JobResult::success(n)),
        4,
    )
    .expect("Failed to start run");

    assert_eq!(stream.worker_count(), 4);
    assert_eq!(
        sorted_payloads(stream),
        vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]
    );
    producer.join().unwrap();
}

#[test]
fn test_workers_run_in_parallel() {
    let token = CancellationToken::new();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let stream = {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        run_from_slice(
            &token,
            vec![(); 8],
            move |_: &CancellationToken, _: ()| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                active.fetch_sub(1, Ordering::SeqCst);
                Some(JobResult::success(()))
            },
            4,
        )
        .expect("Failed to start run")
    };

    assert_eq!(stream.count(), 8);
    assert!(peak.load(Ordering::SeqCst) > 1);
    assert!(peak.load(Ordering::SeqCst) <= 4);
}

#[test]
fn test_slow_consumer_applies_backpressure() {
    let token = CancellationToken::new();
    let invoked = Arc::new(AtomicUsize::new(0));

    let stream = {
        let invoked = Arc::clone(&invoked);
        run_from_slice(
            &token,
            0..100u32,
            move |_: &CancellationToken, n: u32| {
                invoked.fetch_add(1, Ordering::SeqCst);
                Some(JobResult::success(n))
            },
            2,
        )
        .expect("Failed to start run")
    };

    // Nobody reads: 2 results buffered + 2 blocked in send + 2 in the input queue
    thread::sleep(Duration::from_millis(100));
    assert!(invoked.load(Ordering::SeqCst) <= 4);

    assert_eq!(stream.count(), 100);
}

#[test]
fn test_stats_match_results() {
    init_logging();
    let token = CancellationToken::new();
    let mut stream = run_from_slice(
        &token,
        0..30u32,
        |_: &CancellationToken, n: u32| match n % 3 {
            0 => None,
            1 => Some(JobResult::success(n)),
            _ => panic!("bad item"),
        },
        3,
    )
    .expect("Failed to start run");

    let results: Vec<JobResult<u32>> = stream.by_ref().collect();
    let stats = stream.stats();

    assert_eq!(results.len(), 20);
    assert_eq!(stats.workers, 3);
    assert_eq!(stats.items_processed, 30);
    assert_eq!(stats.items_skipped, 10);
    assert_eq!(stats.results_succeeded, 10);
    assert_eq!(stats.results_panicked, 10);
    assert_eq!(stats.results_emitted, 20);
    assert_eq!(stats.results_dropped, 0);
}

#[test]
fn test_pool_reused_across_runs() {
    let pool = WorkerPool::with_config(PoolConfig::new(3).with_thread_name_prefix("reuse"))
        .expect("Failed to create pool");
    let token = CancellationToken::new();

    let a = pool.run_from_slice(&token, vec![1u32, 2], doubled_unless_three).unwrap();
    let b = pool.run_from_slice(&token, vec![5u32, 6, 7, 8], doubled_unless_three).unwrap();

    assert_ne!(a.run_id(), b.run_id());
    assert_eq!(sorted_payloads(b), vec![10, 12, 14, 16]);
    assert_eq!(sorted_payloads(a), vec![2, 4]);
}
