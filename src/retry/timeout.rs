//! Caller-side deadline for a whole retry run.
//!
//! The controller never wraps the operation's error. The one error type added
//! by this crate is the one produced when a caller bounds a run in time.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Why a run bounded by [`with_timeout`] produced no value.
///
/// # Examples
///
/// ```rust
/// use retry_with_logger::{with_timeout, TimeoutError};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let result = with_timeout(Duration::from_millis(10), async {
///     tokio::time::sleep(Duration::from_secs(10)).await;
///     Ok::<_, String>(42)
/// })
/// .await;
///
/// assert_eq!(result, Err(TimeoutError::Elapsed(Duration::from_millis(10))));
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError<E> {
    /// The deadline passed while the run was still attempting or sleeping.
    Elapsed(Duration),
    /// The run gave up in time and handed back this error.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elapsed(deadline) => write!(
                f,
                "retry run still pending after its {}ms deadline",
                deadline.as_millis()
            ),
            Self::Failed(error) => write!(f, "retry run gave up: {}", error),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeoutError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Elapsed(_) => None,
        }
    }
}

/// Bound a fallible future by a deadline.
///
/// Meant for wrapping a complete [`retry`](crate::retry::retry) call: the
/// controller has no cancellation of its own, so dropping it here is how a
/// caller stops a run that is sleeping between attempts. Dropping releases the
/// pending timer.
///
/// # Examples
///
/// ```rust
/// use retry_with_logger::{retry, with_timeout, RetryConfig, TimeoutError};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let config = RetryConfig::new().with_interval(Duration::from_secs(60));
///
/// let result = with_timeout(
///     Duration::from_millis(20),
///     retry(|| async { Err::<(), _>("down") }, &config),
/// )
/// .await;
///
/// assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
/// # });
/// ```
pub async fn with_timeout<T, E, Fut>(deadline: Duration, future: Fut) -> Result<T, TimeoutError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(deadline))?
        .map_err(TimeoutError::Failed)
}
