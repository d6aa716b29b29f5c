//! # fanout_pool
//!
//! A bounded fan-out/fan-in worker pool: a stream of items is spread across a
//! fixed number of worker threads, a job function runs once per item, and the
//! non-empty results come back on a single stream.
//!
//! ## Features
//!
//! - **Two input shapes**: an in-memory sequence, or any `crossbeam` channel
//! - **Bounded queues**: input and output channels are sized to the worker count,
//!   so slow consumers throttle workers and slow workers throttle the producer
//! - **Cooperative cancellation**: one [`CancellationToken`] per run, observed
//!   before every dequeue and every result hand-off
//! - **Panic containment**: a panicking job becomes a [`JobResult::Panicked`]
//!   result; the worker keeps going
//! - **Self-closing output**: the result stream ends once every worker exited
//!
//! ## Quick Start
//!
//! ```rust
//! use fanout_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let token = CancellationToken::new();
//!
//! // 3 is skipped, everything else is doubled
//! let stream = run_from_slice(
//!     &token,
//!     vec![2u32, 3, 4],
//!     |_: &CancellationToken, n: u32| (n != 3).then(|| JobResult::success(n * 2)),
//!     2,
//! )?;
//!
//! let mut doubled: Vec<u32> = stream
//!     .map(|result| result.into_result().unwrap())
//!     .collect();
//! doubled.sort();
//! assert_eq!(doubled, vec![4, 8]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failures
//!
//! ```rust
//! use fanout_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let token = CancellationToken::new();
//! let stream = run_from_slice(&token, vec![1u8, 0], |_: &CancellationToken, n: u8| {
//!     if n == 0 {
//!         panic!("zero is not allowed");
//!     }
//!     Some(JobResult::success(100 / n))
//! }, 2)?;
//!
//! let results: Vec<JobResult<u8>> = stream.collect();
//! assert_eq!(results.len(), 2);
//! assert_eq!(results.iter().filter(|r| r.is_panic()).count(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;

pub use crate::core::{
    CancellationReason, CancellationToken, JobCallback, JobError, JobPanic, JobResult,
    NamedCallback, PoolError, Result,
};
pub use crate::pool::{
    run_from_producer, run_from_slice, PoolConfig, ResultStream, StatsSnapshot, WorkerPool,
    WorkerStats,
};
