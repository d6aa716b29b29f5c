//! Feeds an in-memory sequence into a pool's input channel.

use crate::core::{CancellationToken, PoolError, Result};
use crossbeam::channel::{select, Sender};
use log::debug;
use std::thread;

/// How the dispatcher finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every item was handed to the input channel
    Completed {
        /// Items sent
        sent: usize,
    },
    /// The run was cancelled; remaining items were not sent
    Cancelled {
        /// Items sent before cancellation
        sent: usize,
    },
    /// No worker is left to receive (zero workers, or all exited)
    Disconnected {
        /// Items sent before the input channel lost its receivers
        sent: usize,
    },
}

/// Send `items` in order, racing each send against cancellation
///
/// Stops as soon as the token fires. `input` is dropped on return, which
/// closes the channel so workers drain the backlog and exit.
pub(crate) fn dispatch<I>(items: I, input: Sender<I::Item>, token: &CancellationToken) -> DispatchOutcome
where
    I: IntoIterator,
{
    let mut sent = 0;
    for item in items {
        if token.is_cancelled() {
            return DispatchOutcome::Cancelled { sent };
        }
        select! {
            recv(token.done()) -> _ => return DispatchOutcome::Cancelled { sent },
            send(input, item) -> res => {
                if res.is_err() {
                    return DispatchOutcome::Disconnected { sent };
                }
                sent += 1;
            }
        }
    }
    DispatchOutcome::Completed { sent }
}

/// Run [`dispatch`] on its own named thread
pub(crate) fn spawn_dispatcher<I>(
    thread_name: String,
    items: I,
    input: Sender<I::Item>,
    token: CancellationToken,
) -> Result<thread::JoinHandle<DispatchOutcome>>
where
    I: IntoIterator + Send + 'static,
    I::Item: Send + 'static,
{
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let outcome = dispatch(items, input, &token);
            debug!("dispatcher finished: {:?}", outcome);
            outcome
        })
        .map_err(|e| PoolError::spawn("dispatcher", thread_name, e))
}
