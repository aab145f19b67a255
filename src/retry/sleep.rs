//! The delay primitive used between attempts.

use std::time::Duration;

use futures::future::BoxFuture;

/// Suspends a retry run for a given duration.
///
/// The returned future must complete no earlier than `duration` from now.
/// Dropping it before completion must release whatever timer backs it.
///
/// Closures returning a boxed future implement this trait, which is handy for
/// tests or for runtimes other than tokio:
///
/// ```rust
/// use futures::FutureExt;
/// use retry_with_logger::{RetryConfig, Sleep};
/// use std::time::Duration;
///
/// let config = RetryConfig::<String>::new()
///     .with_sleep(|_delay: Duration| async {}.boxed());
/// ```
pub trait Sleep: Send + Sync {
    /// Wait for `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

impl<F> Sleep for F
where
    F: Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync,
{
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self(duration)
    }
}

/// Sleeps on the tokio timer. The default delay primitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

impl Sleep for TokioSleep {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
