//! Convenient re-exports for common types and traits

pub use crate::core::{
    CancellationReason, CancellationToken, JobCallback, JobResult, NamedCallback, PoolError,
    Result,
};
pub use crate::pool::{
    run_from_producer, run_from_slice, PoolConfig, ResultStream, StatsSnapshot, WorkerPool,
};
