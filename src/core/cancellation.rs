//! Cooperative cancellation for pool runs
//!
//! A [`CancellationToken`] is the single shared, idempotent "stop" signal of a
//! pool run. Workers and the slice dispatcher observe it in two ways: a cheap
//! [`is_cancelled()`](CancellationToken::is_cancelled) check, and the
//! [`done()`](CancellationToken::done) receiver, which becomes ready (disconnected)
//! the moment the token is cancelled and can therefore take part in a
//! `crossbeam::channel::select!` next to channel sends and receives.
//!
//! # Features
//!
//! - **Hierarchical cancellation**: child tokens are cancelled with their parent
//! - **Deadlines**: tokens that auto-cancel after a duration
//! - **Cancellation reasons**: track why a token was cancelled
//!
//! # Example
//!
//! ```rust
//! use fanout_pool::CancellationToken;
//!
//! let parent = CancellationToken::new();
//! let child1 = parent.child();
//! let child2 = parent.child();
//!
//! // Cancel parent - all children are also cancelled
//! parent.cancel();
//!
//! assert!(parent.is_cancelled());
//! assert!(child1.is_cancelled());
//! assert!(child2.is_cancelled());
//! ```

use crate::core::{PoolError, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::error;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

const TIMER_THREAD_NAME: &str = "cancel-timer";

/// Reason for cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled by user via `cancel()` or `cancel_with_reason()`
    Manual,
    /// Cancelled due to deadline expiration
    Timeout(Duration),
    /// Cancelled because the parent token was cancelled
    ParentCancelled,
    /// Cancelled because the consumer dropped the result stream
    ConsumerGone,
    /// Cancelled due to an error condition
    Error(String),
    /// Custom cancellation reason
    Custom(String),
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::Timeout(d) => write!(f, "timeout after {:?}", d),
            CancellationReason::ParentCancelled => write!(f, "parent was cancelled"),
            CancellationReason::ConsumerGone => write!(f, "result stream was dropped"),
            CancellationReason::Error(msg) => write!(f, "error: {}", msg),
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

struct CancellationTokenInner {
    cancelled: AtomicBool,
    reason: RwLock<Option<CancellationReason>>,
    /// Child tokens (weak references to avoid cycles)
    children: RwLock<Vec<Weak<CancellationTokenInner>>>,
    /// Dropped on cancel, which disconnects `done`
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

impl CancellationTokenInner {
    fn new() -> Self {
        let (trigger, done) = channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            reason: RwLock::new(None),
            children: RwLock::new(Vec::new()),
            trigger: Mutex::new(Some(trigger)),
            done,
        }
    }
}

impl std::fmt::Debug for CancellationTokenInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationTokenInner")
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .field("children_count", &self.children.read().len())
            .field("reason", &*self.reason.read())
            .finish()
    }
}

/// A thread-safe, cloneable cancellation signal shared by a pool run and its caller
///
/// Cancelling any clone cancels them all. Cancellation is one-way: a cancelled
/// token never becomes active again.
///
/// # Example
///
/// ```rust
/// use fanout_pool::CancellationToken;
/// use std::thread;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let token_clone = token.clone();
///
/// let handle = thread::spawn(move || {
///     for _ in 0..50 {
///         if token_clone.is_cancelled() {
///             return "Cancelled";
///         }
///         thread::sleep(Duration::from_millis(20));
///     }
///     "Completed"
/// });
///
/// thread::sleep(Duration::from_millis(50));
/// token.cancel();
///
/// assert_eq!(handle.join().unwrap(), "Cancelled");
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationTokenInner::new()),
        }
    }

    /// Creates a child token linked to this parent
    ///
    /// The child is cancelled when the parent is cancelled, but cancelling the
    /// child leaves the parent untouched. If the parent is already cancelled,
    /// the child is created in a cancelled state.
    pub fn child(&self) -> Self {
        let child = CancellationToken::new();

        {
            let mut children = self.inner.children.write();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        if self.is_cancelled() {
            child.cancel_with_reason(CancellationReason::ParentCancelled);
        }

        child
    }

    /// Creates a token that auto-cancels after the specified timeout
    ///
    /// A background timer thread fires the cancellation. If the token is
    /// cancelled earlier, the timer thread exits without effect.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fanout_pool::{CancellationReason, CancellationToken};
    /// use std::time::Duration;
    /// use std::thread;
    ///
    /// let token = CancellationToken::with_timeout(Duration::from_millis(50));
    /// assert!(!token.is_cancelled());
    ///
    /// thread::sleep(Duration::from_millis(150));
    /// assert!(token.is_cancelled());
    /// assert_eq!(token.reason(), Some(CancellationReason::Timeout(Duration::from_millis(50))));
    /// ```
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = Self::new();
        token.arm_timer(timeout);
        token
    }

    /// Creates a child token that auto-cancels after the specified timeout
    ///
    /// The child is cancelled when the parent is cancelled or when the timeout
    /// expires, whichever happens first.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let child = self.child();
        child.arm_timer(timeout);
        child
    }

    fn arm_timer(&self, timeout: Duration) {
        self.arm_timer_with(thread::Builder::new().name(TIMER_THREAD_NAME.to_string()), timeout);
    }

    /// Start the deadline thread; a token whose deadline cannot be enforced
    /// is cancelled right away
    fn arm_timer_with(&self, builder: thread::Builder, timeout: Duration) {
        let token = self.clone();
        let spawned = builder.spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = token.inner.done.recv_timeout(timeout) {
                token.cancel_with_reason(CancellationReason::Timeout(timeout));
            }
        });

        if let Err(e) = spawned {
            let e = PoolError::spawn("timer", TIMER_THREAD_NAME, e);
            error!("{}", e);
            self.cancel_with_reason(CancellationReason::Error(e.to_string()));
        }
    }

    /// Cancel this token with default reason (Manual)
    ///
    /// Idempotent; only the first call records a reason.
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel this token and all of its children with a specific reason
    pub fn cancel_with_reason(&self, reason: CancellationReason) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.inner.reason.write() = Some(reason);

        // Wakes every select! waiting on `done`
        drop(self.inner.trigger.lock().take());

        let children = self.inner.children.read();
        for child_weak in children.iter() {
            if let Some(child_inner) = child_weak.upgrade() {
                let child_token = CancellationToken { inner: child_inner };
                child_token.cancel_with_reason(CancellationReason::ParentCancelled);
            }
        }
    }

    /// Check if this token has been cancelled
    ///
    /// Lock-free, suitable for polling inside long-running callbacks.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the cancellation reason, or `None` if not cancelled
    pub fn reason(&self) -> Option<CancellationReason> {
        self.inner.reason.read().clone()
    }

    /// Returns an error if cancelled, `Ok(())` otherwise
    ///
    /// ```rust
    /// use fanout_pool::{CancellationToken, PoolError};
    ///
    /// fn crunch(token: &CancellationToken) -> Result<u64, PoolError> {
    ///     let mut acc = 0;
    ///     for i in 0..100 {
    ///         token.check()?;
    ///         acc += i;
    ///     }
    ///     Ok(acc)
    /// }
    /// # assert_eq!(crunch(&CancellationToken::new()).unwrap(), 4950);
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            let reason_str = self
                .reason()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Err(PoolError::cancelled(reason_str))
        } else {
            Ok(())
        }
    }

    /// Receiver that becomes ready once the token is cancelled
    ///
    /// Nothing is ever sent on it; cancellation disconnects it, so a
    /// `recv(token.done())` arm of `select!` fires with `Err(RecvError)`.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Block until the token is cancelled
    pub fn wait(&self) {
        let _ = self.inner.done.recv();
    }

    /// Block until the token is cancelled or the timeout elapses
    ///
    /// Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(
            self.inner.done.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
