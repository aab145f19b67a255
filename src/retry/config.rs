//! Full configuration of a retry run.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::retry::batch::{BatchIdSource, UuidBatchId};
use crate::retry::log::RetryLogger;
use crate::retry::policy::RetryPolicy;
use crate::retry::sleep::{Sleep, TokioSleep};

type TerminalPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Everything the controller needs besides the operation itself.
///
/// Combines a [`RetryPolicy`] with the pieces that can't be plain data: the
/// terminal-error predicate, the logger, and the id and delay collaborators.
/// Every field is optional; [`RetryConfig::new`] starts from the defaults
/// (5 retries, 200ms apart, no backoff, nothing terminal, no logger).
///
/// A config is immutable once built and cheap to clone. One config can drive
/// any number of concurrent runs.
///
/// # Examples
///
/// ```rust
/// use retry_with_logger::{RetryConfig, TracingLogger};
/// use serde_json::json;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// enum FetchError {
///     NotFound,
///     Unavailable,
/// }
///
/// impl std::fmt::Display for FetchError {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "{:?}", self)
///     }
/// }
///
/// let config = RetryConfig::new()
///     .with_max_retry_count(3)
///     .with_interval(Duration::from_millis(100))
///     .with_exponential_backoff(true)
///     .with_terminal_error(|e: &FetchError| matches!(e, FetchError::NotFound))
///     .with_log_field("proc", json!("fetch_profile"))
///     .with_logger(TracingLogger::new());
///
/// assert!(config.is_terminal(&FetchError::NotFound));
/// assert!(!config.is_terminal(&FetchError::Unavailable));
/// ```
pub struct RetryConfig<E> {
    policy: RetryPolicy,
    is_terminal_error: Option<TerminalPredicate<E>>,
    extra_log_data: Map<String, Value>,
    logger: Option<Arc<dyn RetryLogger<E>>>,
    id_source: Arc<dyn BatchIdSource>,
    sleep: Arc<dyn Sleep>,
}

impl<E> RetryConfig<E> {
    /// Create a configuration with the default policy and collaborators.
    pub fn new() -> Self {
        Self::from_policy(RetryPolicy::default())
    }

    /// Create a configuration around an existing policy.
    ///
    /// Useful when the policy was loaded from a settings file.
    pub fn from_policy(policy: RetryPolicy) -> Self {
        Self {
            policy,
            is_terminal_error: None,
            extra_log_data: Map::new(),
            logger: None,
            id_source: Arc::new(UuidBatchId),
            sleep: Arc::new(TokioSleep),
        }
    }

    /// Replace the policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the number of retries after the initial attempt.
    pub fn with_max_retry_count(mut self, n: u32) -> Self {
        self.policy = self.policy.with_max_retry_count(n);
        self
    }

    /// Set the base delay between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.policy = self.policy.with_interval(interval);
        self
    }

    /// Double the delay after every failed attempt.
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.policy = self.policy.with_exponential_backoff(enabled);
        self
    }

    /// Set how many retries go unreported.
    pub fn with_acceptable_retry_count(mut self, n: u32) -> Self {
        self.policy = self.policy.with_acceptable_retry_count(n);
        self
    }

    /// Classify errors that must not be retried.
    ///
    /// The predicate is consulted on every failure, including the last one.
    pub fn with_terminal_error<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_terminal_error = Some(Arc::new(predicate));
        self
    }

    /// Replace the extra fields merged into every log record.
    pub fn with_extra_log_data(mut self, extra: Map<String, Value>) -> Self {
        self.extra_log_data = extra;
        self
    }

    /// Add one extra field to every log record.
    pub fn with_log_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_log_data.insert(key.into(), value.into());
        self
    }

    /// Report outcomes to `logger`.
    pub fn with_logger<L>(mut self, logger: L) -> Self
    where
        L: RetryLogger<E> + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Generate batch ids with `source` instead of random UUIDs.
    pub fn with_id_source<S>(mut self, source: S) -> Self
    where
        S: BatchIdSource + 'static,
    {
        self.id_source = Arc::new(source);
        self
    }

    /// Wait between attempts with `sleep` instead of the tokio timer.
    pub fn with_sleep<S>(mut self, sleep: S) -> Self
    where
        S: Sleep + 'static,
    {
        self.sleep = Arc::new(sleep);
        self
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The extra log fields.
    pub fn extra_log_data(&self) -> &Map<String, Value> {
        &self.extra_log_data
    }

    /// The configured logger, if any.
    pub fn logger(&self) -> Option<&dyn RetryLogger<E>> {
        self.logger.as_deref()
    }

    /// Returns true if `error` is classified terminal.
    ///
    /// Always false without a predicate.
    pub fn is_terminal(&self, error: &E) -> bool {
        self.is_terminal_error
            .as_ref()
            .is_some_and(|predicate| predicate(error))
    }

    pub(crate) fn next_batch_id(&self) -> String {
        self.id_source.next_id()
    }

    pub(crate) async fn sleep(&self, delay: Duration) {
        self.sleep.sleep(delay).await
    }

    /// Run `operation` under this configuration.
    ///
    /// Same as [`retry`](crate::retry::retry).
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        crate::retry::retry(operation, self).await
    }
}

impl<E> Default for RetryConfig<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for RetryConfig<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            is_terminal_error: self.is_terminal_error.clone(),
            extra_log_data: self.extra_log_data.clone(),
            logger: self.logger.clone(),
            id_source: self.id_source.clone(),
            sleep: self.sleep.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("policy", &self.policy)
            .field("is_terminal_error", &self.is_terminal_error.is_some())
            .field("extra_log_data", &self.extra_log_data)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}
