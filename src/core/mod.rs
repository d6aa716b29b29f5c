//! Core types and traits for the worker pool

pub mod cancellation;
pub mod error;
pub mod job;

pub use cancellation::{CancellationReason, CancellationToken};
pub use error::{JobError, JobPanic, PoolError, Result};
pub use job::{JobCallback, JobResult, NamedCallback};
