//! Worker pool, workers, dispatcher and result stream

pub mod config;
pub(crate) mod dispatcher;
pub mod stats;
pub mod stream;
pub(crate) mod worker;
pub mod worker_pool;

pub use config::PoolConfig;
pub use stats::{StatsSnapshot, WorkerStats};
pub use stream::ResultStream;
pub use worker_pool::{run_from_producer, run_from_slice, WorkerPool};
