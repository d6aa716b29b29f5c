//! Worker pool entry points and the join controller

use crate::core::{CancellationReason, CancellationToken, JobCallback, JobResult, PoolError, Result};
use crate::pool::config::PoolConfig;
use crate::pool::dispatcher::spawn_dispatcher;
use crate::pool::stream::ResultStream;
use crate::pool::worker::Worker;
use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, trace};
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

/// A fan-out/fan-in worker pool
///
/// Each call to [`run_from_producer`](Self::run_from_producer) or
/// [`run_from_slice`](Self::run_from_slice) starts a fresh set of worker
/// threads, bounded input and output channels and a supervisor thread that
/// closes the output once every worker has exited. Nothing is shared between
/// runs, so one `WorkerPool` can serve any number of concurrent runs.
///
/// # Example
///
/// ```rust
/// use fanout_pool::prelude::*;
///
/// # fn main() -> Result<()> {
/// let pool = WorkerPool::with_config(
///     PoolConfig::new(4).with_thread_name_prefix("lengths"),
/// )?;
/// let token = CancellationToken::new();
///
/// let words = vec!["alpha", "", "gamma"];
/// let stream = pool.run_from_slice(&token, words, |_: &CancellationToken, w: &str| {
///     // Empty words produce no result
///     (!w.is_empty()).then(|| JobResult::success(w.len()))
/// })?;
///
/// let mut lengths: Vec<usize> = stream.filter_map(|r| r.into_result().ok()).collect();
/// lengths.sort();
/// assert_eq!(lengths, vec![5, 5]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WorkerPool {
    config: PoolConfig,
}

impl WorkerPool {
    /// Create a pool with default configuration (one worker per CPU)
    pub fn new() -> Result<Self> {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with the given number of workers
    pub fn with_workers(num_workers: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(num_workers))
    }

    /// Create a pool with custom configuration
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Configured number of workers per run
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Process every item received from `input`
    ///
    /// Exactly `num_workers` workers are started, even zero. The caller owns
    /// the producer side and must drop every `Sender` for the workers to
    /// observe the end of input; cancelling `token` ends the run early.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SpawnError`] if a thread cannot be started. Any
    /// workers already running are cancelled.
    pub fn run_from_producer<T, K, C>(
        &self,
        token: &CancellationToken,
        input: Receiver<T>,
        callback: C,
    ) -> Result<ResultStream<K>>
    where
        T: Send + 'static,
        K: Send + 'static,
        C: JobCallback<T, K> + 'static,
    {
        let run_token = token.child();
        self.launch(run_token, input, Arc::new(callback), self.config.num_workers)
    }

    /// Process every element of an in-memory sequence
    ///
    /// The worker count is clamped to the number of items. Items enter the
    /// input channel in sequence order; results come out in completion order.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SpawnError`] if a thread cannot be started.
    pub fn run_from_slice<I, K, C>(
        &self,
        token: &CancellationToken,
        items: I,
        callback: C,
    ) -> Result<ResultStream<K>>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator + Send + 'static,
        I::Item: Send + 'static,
        K: Send + 'static,
        C: JobCallback<I::Item, K> + 'static,
    {
        let items = items.into_iter();
        let worker_count = self.config.num_workers.min(items.len());
        let (input_tx, input_rx) = channel::bounded(worker_count);

        let run_token = token.child();
        let stream = self.launch(run_token.clone(), input_rx, Arc::new(callback), worker_count)?;

        let dispatcher_name = self.config.thread_name("dispatch");
        if let Err(e) = spawn_dispatcher(dispatcher_name, items, input_tx, run_token.clone()) {
            run_token.cancel_with_reason(CancellationReason::Error(e.to_string()));
            return Err(e);
        }

        Ok(stream)
    }

    fn launch<T, K, C>(
        &self,
        run_token: CancellationToken,
        input: Receiver<T>,
        callback: Arc<C>,
        worker_count: usize,
    ) -> Result<ResultStream<K>>
    where
        T: Send + 'static,
        K: Send + 'static,
        C: JobCallback<T, K> + ?Sized + 'static,
    {
        let run_id = Uuid::new_v4();
        let (output_tx, output_rx) = channel::bounded(worker_count);

        debug!(
            "run {} starting {} worker(s) for '{}'",
            run_id,
            worker_count,
            callback.name()
        );

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let thread_name = self.config.thread_name(&format!("worker-{}", id));
            let spawned = Worker::spawn(
                id,
                thread_name,
                input.clone(),
                output_tx.clone(),
                Arc::clone(&callback),
                run_token.clone(),
            );
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    run_token.cancel_with_reason(CancellationReason::Error(e.to_string()));
                    return Err(e);
                }
            }
        }
        // From here on only the workers hold the input receiver
        drop(input);

        let worker_stats = workers.iter().map(Worker::stats).collect();
        let supervisor_name = self.config.thread_name("join");
        if let Err(e) = spawn_supervisor(supervisor_name, run_id, workers, output_tx) {
            run_token.cancel_with_reason(CancellationReason::Error(e.to_string()));
            return Err(e);
        }

        Ok(ResultStream::new(output_rx, run_token, run_id, worker_stats))
    }
}

/// Join every worker, then close the output channel
///
/// `output` is the last sender not owned by a worker; dropping it after the
/// joins is what closes the stream, exactly once.
fn spawn_supervisor<K>(
    thread_name: String,
    run_id: Uuid,
    workers: Vec<Worker>,
    output: Sender<JobResult<K>>,
) -> Result<()>
where
    K: Send + 'static,
{
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            for worker in workers {
                let id = worker.id();
                match worker.join() {
                    Ok(exit) => trace!("run {}: worker #{} joined ({:?})", run_id, id, exit),
                    Err(e) => error!("run {}: {}", run_id, e),
                }
            }
            drop(output);
            debug!("run {}: all workers exited, output closed", run_id);
        })
        .map(|_| ())
        .map_err(|e| PoolError::spawn("supervisor", thread_name, e))
}

/// Process every item received from `input` with `workers` workers
///
/// Shorthand for [`WorkerPool::run_from_producer`] with a default-named pool.
///
/// ```rust
/// use fanout_pool::prelude::*;
/// use crossbeam::channel;
/// use std::thread;
///
/// # fn main() -> Result<()> {
/// let (tx, rx) = channel::bounded(4);
/// thread::spawn(move || {
///     for n in 1..=20u64 {
///         tx.send(n).unwrap();
///     }
/// });
///
/// let token = CancellationToken::new();
/// let stream = run_from_producer(&token, rx, |_: &CancellationToken, n: u64| {
///     (n % 5 == 0).then(|| JobResult::success(n))
/// }, 4)?;
///
/// let mut found: Vec<u64> = stream.map(|r| r.into_result().unwrap()).collect();
/// found.sort();
/// assert_eq!(found, vec![5, 10, 15, 20]);
/// # Ok(())
/// # }
/// ```
pub fn run_from_producer<T, K, C>(
    token: &CancellationToken,
    input: Receiver<T>,
    callback: C,
    workers: usize,
) -> Result<ResultStream<K>>
where
    T: Send + 'static,
    K: Send + 'static,
    C: JobCallback<T, K> + 'static,
{
    WorkerPool::with_workers(workers)?.run_from_producer(token, input, callback)
}

/// Process every element of `items` with at most `workers` workers
///
/// Shorthand for [`WorkerPool::run_from_slice`] with a default-named pool.
pub fn run_from_slice<I, K, C>(
    token: &CancellationToken,
    items: I,
    callback: C,
    workers: usize,
) -> Result<ResultStream<K>>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator + Send + 'static,
    I::Item: Send + 'static,
    K: Send + 'static,
    C: JobCallback<I::Item, K> + 'static,
{
    WorkerPool::with_workers(workers)?.run_from_slice(token, items, callback)
}
