//! Worker thread implementation

use crate::core::{
    CancellationReason, CancellationToken, JobCallback, JobPanic, JobResult, PoolError, Result,
};
use crate::pool::stats::WorkerStats;
use crossbeam::channel::{select, Receiver, Sender};
use log::{debug, trace, warn};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Input channel closed and drained
    Drained,
    /// The run's token was cancelled
    Cancelled,
    /// The result stream was dropped by the consumer
    Disconnected,
}

/// A worker thread that pulls items from the shared input channel
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread_name: String,
    thread: thread::JoinHandle<WorkerExit>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a worker thread
    ///
    /// # Arguments
    ///
    /// * `id` - Index of this worker within its run
    /// * `thread_name` - Name given to the OS thread
    /// * `input` - Shared input channel; the worker exits once it is closed and empty
    /// * `output` - Shared output channel
    /// * `callback` - Job function
    /// * `token` - The run's cancellation token
    pub(crate) fn spawn<T, K, C>(
        id: usize,
        thread_name: String,
        input: Receiver<T>,
        output: Sender<JobResult<K>>,
        callback: Arc<C>,
        token: CancellationToken,
    ) -> Result<Self>
    where
        T: Send + 'static,
        K: Send + 'static,
        C: JobCallback<T, K> + ?Sized + 'static,
    {
        let stats = Arc::new(WorkerStats::new());
        let job = WorkerLoop {
            id,
            input,
            output,
            callback,
            token,
            stats: Arc::clone(&stats),
            _item: PhantomData,
        };

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || job.run())
            .map_err(|e| PoolError::spawn("worker", thread_name.clone(), e))?;

        Ok(Self {
            id,
            thread_name,
            thread,
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for the worker thread to finish
    ///
    /// Returns an error only if the thread itself unwound, which the per-job
    /// containment makes unreachable for panics raised by callbacks.
    pub fn join(self) -> Result<WorkerExit> {
        let Worker {
            id,
            thread_name,
            thread,
            ..
        } = self;
        thread.join().map_err(|payload| {
            let panic = JobPanic::from_payload(id, "worker", payload.as_ref());
            PoolError::join(thread_name, panic.message)
        })
    }
}

/// State moved into a worker thread
struct WorkerLoop<T, K, C: ?Sized> {
    id: usize,
    input: Receiver<T>,
    output: Sender<JobResult<K>>,
    callback: Arc<C>,
    token: CancellationToken,
    stats: Arc<WorkerStats>,
    _item: PhantomData<fn(T)>,
}

impl<T, K, C> WorkerLoop<T, K, C>
where
    C: JobCallback<T, K> + ?Sized,
{
    fn run(self) -> WorkerExit {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = self.id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        trace!("worker #{} started", self.id);
        let exit = self.process();
        debug!(
            "worker #{} exiting ({:?}): {} processed, {} emitted",
            self.id,
            exit,
            self.stats.items_processed(),
            self.stats.results_emitted()
        );
        exit
    }

    fn process(&self) -> WorkerExit {
        loop {
            if self.token.is_cancelled() {
                return WorkerExit::Cancelled;
            }

            let item = select! {
                recv(self.token.done()) -> _ => return WorkerExit::Cancelled,
                recv(self.input) -> msg => match msg {
                    Ok(item) => item,
                    Err(_) => return WorkerExit::Drained,
                },
            };

            let Some(result) = self.execute_job(item) else {
                continue;
            };

            select! {
                recv(self.token.done()) -> _ => {
                    self.stats.record_dropped();
                    return WorkerExit::Cancelled;
                }
                send(self.output, result) -> sent => match sent {
                    Ok(()) => self.stats.record_emitted(),
                    Err(_) => {
                        self.stats.record_dropped();
                        self.token.cancel_with_reason(CancellationReason::ConsumerGone);
                        return WorkerExit::Disconnected;
                    }
                },
            }
        }
    }

    /// Run the callback on one item with panic protection
    fn execute_job(&self, item: T) -> Option<JobResult<K>> {
        #[cfg(feature = "tracing")]
        let job_span = span!(Level::TRACE, "job_execution", callback = self.callback.name());
        #[cfg(feature = "tracing")]
        let _job_guard = job_span.enter();

        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.callback.call(&self.token, item)));
        self.stats.record_invocation(start.elapsed());

        let result = match outcome {
            Ok(Some(result)) => result,
            Ok(None) => {
                self.stats.record_skip();
                return None;
            }
            Err(payload) => {
                let panic = JobPanic::from_payload(self.id, self.callback.name(), payload.as_ref());
                warn!("{}", panic);
                JobResult::Panicked(panic)
            }
        };

        match &result {
            JobResult::Success(_) => self.stats.record_success(),
            JobResult::Failed { .. } => self.stats.record_failure(),
            JobResult::Panicked(_) => self.stats.record_panic(),
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use std::time::Duration;

    type Callback = dyn JobCallback<u32, u32>;

    fn spawn_worker(
        callback: Arc<Callback>,
        input_cap: usize,
        output_cap: usize,
    ) -> (
        Worker,
        Sender<u32>,
        Receiver<JobResult<u32>>,
        CancellationToken,
    ) {
        let (in_tx, in_rx) = channel::bounded(input_cap);
        let (out_tx, out_rx) = channel::bounded(output_cap);
        let token = CancellationToken::new();
        let worker = Worker::spawn(
            0,
            "test-worker-0".to_string(),
            in_rx,
            out_tx,
            callback,
            token.clone(),
        )
        .expect("Failed to spawn worker");
        (worker, in_tx, out_rx, token)
    }

    #[test]
    fn test_worker_drains_and_exits() {
        let callback: Arc<Callback> =
            Arc::new(|_: &CancellationToken, n: u32| Some(JobResult::success(n + 1)));
        let (worker, in_tx, out_rx, _token) = spawn_worker(callback, 4, 4);
        assert_eq!(worker.id(), 0);

        for n in 0..3 {
            in_tx.send(n).unwrap();
        }
        drop(in_tx);

        let stats = worker.stats();
        assert_eq!(worker.join().unwrap(), WorkerExit::Drained);

        let results: Vec<u32> = out_rx
            .try_iter()
            .map(|r| r.into_result().unwrap())
            .collect();
        assert_eq!(results, vec![1, 2, 3]);
        assert_eq!(stats.items_processed(), 3);
        assert_eq!(stats.results_emitted(), 3);
    }

    #[test]
    fn test_worker_skips_none() {
        let callback: Arc<Callback> = Arc::new(|_: &CancellationToken, n: u32| {
            (n % 2 == 0).then(|| JobResult::success(n))
        });
        let (worker, in_tx, out_rx, _token) = spawn_worker(callback, 8, 8);

        for n in 0..6 {
            in_tx.send(n).unwrap();
        }
        drop(in_tx);

        let stats = worker.stats();
        worker.join().unwrap();
        assert_eq!(out_rx.try_iter().count(), 3);
        assert_eq!(stats.snapshot().items_skipped, 3);
    }

    #[test]
    fn test_worker_panic_handling() {
        let callback: Arc<Callback> = Arc::new(|_: &CancellationToken, n: u32| {
            if n == 1 {
                panic!("Intentional panic for testing");
            }
            Some(JobResult::success(n))
        });
        let (worker, in_tx, out_rx, _token) = spawn_worker(callback, 4, 4);

        for n in 0..3 {
            in_tx.send(n).unwrap();
        }
        drop(in_tx);

        let stats = worker.stats();
        assert_eq!(worker.join().unwrap(), WorkerExit::Drained);

        let results: Vec<JobResult<u32>> = out_rx.try_iter().collect();
        assert_eq!(results.len(), 3);
        assert!(results[1].is_panic());
        let panic = results[1].panic().unwrap();
        assert_eq!(panic.message, "Intentional panic for testing");
        assert_eq!(panic.worker_id, 0);

        // Worker kept going after the panic
        assert_eq!(results[2].payload(), Some(&2));
        assert_eq!(stats.results_panicked(), 1);
    }

    #[test]
    fn test_worker_exits_on_cancel_while_idle() {
        let callback: Arc<Callback> =
            Arc::new(|_: &CancellationToken, n: u32| Some(JobResult::success(n)));
        let (worker, _in_tx, _out_rx, token) = spawn_worker(callback, 1, 1);

        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert_eq!(worker.join().unwrap(), WorkerExit::Cancelled);
    }

    #[test]
    fn test_worker_drops_result_on_cancel_under_backpressure() {
        let callback: Arc<Callback> =
            Arc::new(|_: &CancellationToken, n: u32| Some(JobResult::success(n)));
        // Output capacity 0: the send blocks until someone receives
        let (worker, in_tx, _out_rx, token) = spawn_worker(callback, 1, 0);

        in_tx.send(7).unwrap();
        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let stats = worker.stats();
        assert_eq!(worker.join().unwrap(), WorkerExit::Cancelled);
        assert_eq!(stats.snapshot().results_dropped, 1);
        assert_eq!(stats.results_emitted(), 0);
    }

    #[test]
    fn test_worker_exits_when_consumer_gone() {
        let callback: Arc<Callback> =
            Arc::new(|_: &CancellationToken, n: u32| Some(JobResult::success(n)));
        let (worker, in_tx, out_rx, token) = spawn_worker(callback, 1, 1);

        drop(out_rx);
        in_tx.send(1).unwrap();

        assert_eq!(worker.join().unwrap(), WorkerExit::Disconnected);
        assert_eq!(token.reason(), Some(CancellationReason::ConsumerGone));
    }

    #[test]
    fn test_join_reports_unwound_thread() {
        let worker = Worker {
            id: 7,
            thread_name: "test-worker-7".to_string(),
            thread: thread::spawn(|| -> WorkerExit { panic!("worker loop broke") }),
            stats: Arc::new(WorkerStats::new()),
        };

        match worker.join() {
            Err(PoolError::JoinError {
                thread_name,
                message,
            }) => {
                assert_eq!(thread_name, "test-worker-7");
                assert_eq!(message, "worker loop broke");
            }
            other => panic!("expected a join error, got {:?}", other),
        }
    }
}
