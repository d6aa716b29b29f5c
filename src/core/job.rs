//! Job results and the callback contract

use crate::core::cancellation::CancellationToken;
use crate::core::error::{JobError, JobPanic};
use std::fmt;

/// Outcome of one processed item
///
/// A callback that wants to emit nothing for an item returns `None` instead of
/// a `JobResult`; such items never reach the result stream.
pub enum JobResult<K> {
    /// The callback succeeded
    Success(K),
    /// The callback reported an error alongside a payload
    Failed {
        /// Reported error
        error: JobError,
        /// Payload the callback chose to return with the error
        payload: K,
    },
    /// The callback panicked and the worker contained it
    Panicked(JobPanic),
}

impl<K> JobResult<K> {
    /// Build a result from an optional error and a payload
    ///
    /// `None` yields [`JobResult::Success`], `Some(err)` yields [`JobResult::Failed`].
    ///
    /// ```rust
    /// use fanout_pool::JobResult;
    ///
    /// let ok = JobResult::new(None::<std::io::Error>, 3);
    /// assert!(ok.is_success());
    ///
    /// let err = JobResult::new(Some(std::io::Error::other("disk")), 0);
    /// assert!(err.is_failure());
    /// ```
    pub fn new<E>(error: Option<E>, payload: K) -> Self
    where
        E: Into<JobError>,
    {
        match error {
            None => JobResult::Success(payload),
            Some(error) => JobResult::Failed {
                error: error.into(),
                payload,
            },
        }
    }

    /// Build a successful result
    pub fn success(payload: K) -> Self {
        JobResult::Success(payload)
    }

    /// Build a reported failure
    pub fn failure<E>(error: E, payload: K) -> Self
    where
        E: Into<JobError>,
    {
        JobResult::Failed {
            error: error.into(),
            payload,
        }
    }

    /// True for [`JobResult::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success(_))
    }

    /// True for [`JobResult::Failed`]
    pub fn is_failure(&self) -> bool {
        matches!(self, JobResult::Failed { .. })
    }

    /// True for [`JobResult::Panicked`]
    pub fn is_panic(&self) -> bool {
        matches!(self, JobResult::Panicked(_))
    }

    /// Payload of a success or reported failure
    pub fn payload(&self) -> Option<&K> {
        match self {
            JobResult::Success(payload) | JobResult::Failed { payload, .. } => Some(payload),
            JobResult::Panicked(_) => None,
        }
    }

    /// Payload, or `K::default()` for a contained panic
    pub fn payload_or_default(self) -> K
    where
        K: Default,
    {
        match self {
            JobResult::Success(payload) | JobResult::Failed { payload, .. } => payload,
            JobResult::Panicked(_) => K::default(),
        }
    }

    /// Error of a reported failure or contained panic
    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            JobResult::Success(_) => None,
            JobResult::Failed { error, .. } => Some(error.as_ref()),
            JobResult::Panicked(panic) => Some(panic),
        }
    }

    /// The contained panic, if any
    pub fn panic(&self) -> Option<&JobPanic> {
        match self {
            JobResult::Panicked(panic) => Some(panic),
            _ => None,
        }
    }

    /// Convert into a standard `Result`, discarding the payload of failures
    pub fn into_result(self) -> Result<K, JobError> {
        match self {
            JobResult::Success(payload) => Ok(payload),
            JobResult::Failed { error, .. } => Err(error),
            JobResult::Panicked(panic) => Err(Box::new(panic)),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for JobResult<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobResult::Success(payload) => f.debug_tuple("Success").field(payload).finish(),
            JobResult::Failed { error, payload } => f
                .debug_struct("Failed")
                .field("error", &error.to_string())
                .field("payload", payload)
                .finish(),
            JobResult::Panicked(panic) => f.debug_tuple("Panicked").field(panic).finish(),
        }
    }
}

/// The per-item function run by pool workers
///
/// Implementations may be called concurrently from several workers on
/// distinct items, in no particular order. Returning `None` emits nothing for
/// the item. Panics are caught by the worker and surface as
/// [`JobResult::Panicked`].
///
/// Closures of the shape `Fn(&CancellationToken, T) -> Option<JobResult<K>>`
/// implement this trait automatically.
pub trait JobCallback<T, K>: Send + Sync {
    /// Process one item
    fn call(&self, token: &CancellationToken, item: T) -> Option<JobResult<K>>;

    /// Name used in logs and in [`JobPanic`]
    fn name(&self) -> &str {
        "job"
    }
}

impl<T, K, F> JobCallback<T, K> for F
where
    F: Fn(&CancellationToken, T) -> Option<JobResult<K>> + Send + Sync,
{
    fn call(&self, token: &CancellationToken, item: T) -> Option<JobResult<K>> {
        self(token, item)
    }
}

/// A closure callback with a custom name
///
/// ```rust
/// use fanout_pool::{CancellationToken, JobCallback, JobResult, NamedCallback};
///
/// let square = NamedCallback::new("square", |_: &CancellationToken, n: u64| {
///     Some(JobResult::success(n * n))
/// });
/// assert_eq!(JobCallback::<u64, u64>::name(&square), "square");
/// ```
pub struct NamedCallback<F> {
    name: String,
    closure: F,
}

impl<F> NamedCallback<F> {
    /// Attach `name` to `closure`
    pub fn new<S: Into<String>>(name: S, closure: F) -> Self {
        Self {
            name: name.into(),
            closure,
        }
    }
}

impl<T, K, F> JobCallback<T, K> for NamedCallback<F>
where
    F: Fn(&CancellationToken, T) -> Option<JobResult<K>> + Send + Sync,
{
    fn call(&self, token: &CancellationToken, item: T) -> Option<JobResult<K>> {
        (self.closure)(token, item)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for NamedCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedCallback")
            .field("name", &self.name)
            .finish()
    }
}
