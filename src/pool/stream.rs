//! Consumer side of a pool run

use crate::core::{CancellationReason, CancellationToken, JobResult};
use crate::pool::stats::{StatsSnapshot, WorkerStats};
use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Results of a pool run, in completion order
///
/// The stream ends once every worker has exited, whether the input was
/// drained or the run was cancelled, so a plain `for` loop is all a consumer
/// needs. Dropping the stream cancels the run.
///
/// ```rust
/// use fanout_pool::prelude::*;
///
/// # fn main() -> Result<()> {
/// let token = CancellationToken::new();
/// let stream = run_from_slice(
///     &token,
///     vec![1u32, 2, 3],
///     |_: &CancellationToken, n: u32| Some(JobResult::success(n * 10)),
///     2,
/// )?;
/// assert_eq!(stream.worker_count(), 2);
///
/// let mut total = 0;
/// for result in stream {
///     total += result.into_result().unwrap();
/// }
/// assert_eq!(total, 60);
/// # Ok(())
/// # }
/// ```
pub struct ResultStream<K> {
    receiver: Receiver<JobResult<K>>,
    token: CancellationToken,
    run_id: Uuid,
    worker_count: usize,
    worker_stats: Vec<Arc<WorkerStats>>,
}

impl<K> ResultStream<K> {
    pub(crate) fn new(
        receiver: Receiver<JobResult<K>>,
        token: CancellationToken,
        run_id: Uuid,
        worker_stats: Vec<Arc<WorkerStats>>,
    ) -> Self {
        Self {
            receiver,
            token,
            run_id,
            worker_count: worker_stats.len(),
            worker_stats,
        }
    }

    /// Block for the next result; `None` once the stream is closed
    pub fn recv(&self) -> Option<JobResult<K>> {
        self.receiver.recv().ok()
    }

    /// Take a result if one is ready
    pub fn try_recv(&self) -> Result<JobResult<K>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for the next result up to `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<JobResult<K>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Underlying channel, for use in `crossbeam::channel::select!`
    pub fn receiver(&self) -> &Receiver<JobResult<K>> {
        &self.receiver
    }

    /// Number of workers this run actually started
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Identifier of this run, as it appears in log lines
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The run's own token (a child of the caller's token)
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel this run without touching the caller's token
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Aggregated counters of all workers
    pub fn stats(&self) -> StatsSnapshot {
        let snapshots: Vec<StatsSnapshot> =
            self.worker_stats.iter().map(|s| s.snapshot()).collect();
        StatsSnapshot::aggregate(&snapshots)
    }

    /// Per-worker counters, indexed by worker id
    pub fn worker_stats(&self) -> &[Arc<WorkerStats>] {
        &self.worker_stats
    }
}

impl<K> Iterator for ResultStream<K> {
    type Item = JobResult<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl<K> Drop for ResultStream<K> {
    fn drop(&mut self) {
        self.token
            .cancel_with_reason(CancellationReason::ConsumerGone);
    }
}

impl<K> std::fmt::Debug for ResultStream<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("run_id", &self.run_id)
            .field("worker_count", &self.worker_count)
            .field("buffered", &self.receiver.len())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
