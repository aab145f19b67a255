//! Retry policy types and the pure retry decisions.

use std::time::Duration;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 5;

/// Default base delay between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// A retry policy describing how many times to retry and how long to wait.
///
/// Policies are pure data - they describe retry behavior but don't execute it.
/// Everything the controller decides per attempt (whether to retry, how long
/// to wait, whether the attempt is worth logging) is computed here.
///
/// # Examples
///
/// ```rust
/// use retry_with_logger::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retry_count(), 5);
/// assert_eq!(policy.interval(), Duration::from_millis(200));
/// assert!(!policy.exponential_backoff());
/// assert_eq!(policy.acceptable_retry_count(), 0);
///
/// let policy = RetryPolicy::new()
///     .with_max_retry_count(3)
///     .with_interval(Duration::from_millis(100))
///     .with_exponential_backoff(true);
/// assert_eq!(policy.total_attempts(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "PolicySettings"))]
pub struct RetryPolicy {
    max_retry_count: u32,
    interval: Duration,
    exponential_backoff: bool,
    acceptable_retry_count: u32,
}

/// `interval * 2^attempt`, saturating at `Duration::MAX`.
fn exponential_delay(interval: Duration, attempt: u32) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;

    if interval.is_zero() {
        return Duration::ZERO;
    }
    1u128
        .checked_shl(attempt)
        .and_then(|factor| interval.as_nanos().checked_mul(factor))
        .and_then(|nanos| {
            let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
            Some(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
        })
        .unwrap_or(Duration::MAX)
}

/// What the controller does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make the next attempt.
    Retry {
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// Stop and hand the error back to the caller.
    GiveUp {
        /// Whether the error was classified as terminal.
        terminal: bool,
    },
}

impl RetryDecision {
    /// Returns true if another attempt will be made.
    pub fn will_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            interval: DEFAULT_INTERVAL,
            exponential_backoff: false,
            acceptable_retry_count: 0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of retries allowed after the initial attempt.
    ///
    /// `with_max_retry_count(3)` means up to 4 total attempts. Zero means a
    /// single attempt whose failure always propagates.
    pub fn with_max_retry_count(mut self, n: u32) -> Self {
        self.max_retry_count = n;
        self
    }

    /// Set the base delay between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Double the delay after every failed attempt.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_with_logger::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new()
    ///     .with_interval(Duration::from_millis(100))
    ///     .with_exponential_backoff(true);
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(200)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(400)));
    /// ```
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Set how many retries are considered unremarkable.
    ///
    /// Failures before this many attempts are not logged at warn level, and a
    /// success needing no more than this many retries is not logged at info
    /// level. Values above `max_retry_count` are accepted as-is.
    pub fn with_acceptable_retry_count(mut self, n: u32) -> Self {
        self.acceptable_retry_count = n;
        self
    }

    /// Get the maximum number of retries.
    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// Get the base delay.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether exponential backoff is enabled.
    pub fn exponential_backoff(&self) -> bool {
        self.exponential_backoff
    }

    /// Get the acceptable retry count.
    pub fn acceptable_retry_count(&self) -> u32 {
        self.acceptable_retry_count
    }

    /// Total number of times the operation may be invoked.
    pub fn total_attempts(&self) -> u64 {
        u64::from(self.max_retry_count) + 1
    }

    /// Calculate the delay after failed attempt N (0-indexed).
    ///
    /// Returns None if attempt N was the last one permitted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_with_logger::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new()
    ///     .with_max_retry_count(2)
    ///     .with_interval(Duration::from_millis(50));
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(50)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(50)));
    /// assert_eq!(policy.delay_for_attempt(2), None);
    /// ```
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if self.is_final_attempt(attempt) {
            return None;
        }

        let delay = if self.exponential_backoff {
            exponential_delay(self.interval, attempt)
        } else {
            self.interval
        };

        Some(delay)
    }

    /// Returns true if no retry is permitted after attempt N.
    pub fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt >= self.max_retry_count
    }

    /// Decide what happens after attempt N failed.
    ///
    /// Terminal errors give up even when retries remain; the final attempt
    /// gives up regardless of classification.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_with_logger::{RetryDecision, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new().with_max_retry_count(1);
    ///
    /// assert_eq!(
    ///     policy.decide(0, false),
    ///     RetryDecision::Retry { delay: Duration::from_millis(200) }
    /// );
    /// assert_eq!(policy.decide(0, true), RetryDecision::GiveUp { terminal: true });
    /// assert_eq!(policy.decide(1, false), RetryDecision::GiveUp { terminal: false });
    /// ```
    pub fn decide(&self, attempt: u32, terminal: bool) -> RetryDecision {
        if terminal {
            return RetryDecision::GiveUp { terminal };
        }
        match self.delay_for_attempt(attempt) {
            Some(delay) => RetryDecision::Retry { delay },
            None => RetryDecision::GiveUp { terminal },
        }
    }

    /// Whether a failure at attempt N should reach the logger.
    ///
    /// Failures that end the run are always reported; retried failures only
    /// once the acceptable retry count is reached.
    pub fn should_log_failure(&self, attempt: u32, will_retry: bool) -> bool {
        attempt >= self.acceptable_retry_count || !will_retry
    }

    /// Whether a success at attempt N needed more retries than acceptable.
    pub fn should_log_success(&self, attempt: u32) -> bool {
        attempt > self.acceptable_retry_count
    }
}

/// Serialized form of [`RetryPolicy`], with the interval in milliseconds.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(default)]
struct PolicySettings {
    max_retry_count: u32,
    interval_ms: u64,
    exponential_backoff: bool,
    acceptable_retry_count: u32,
}

#[cfg(feature = "serde")]
impl Default for PolicySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retry_count: policy.max_retry_count,
            interval_ms: policy.interval.as_millis() as u64,
            exponential_backoff: policy.exponential_backoff,
            acceptable_retry_count: policy.acceptable_retry_count,
        }
    }
}

#[cfg(feature = "serde")]
impl From<PolicySettings> for RetryPolicy {
    fn from(settings: PolicySettings) -> Self {
        Self {
            max_retry_count: settings.max_retry_count,
            interval: Duration::from_millis(settings.interval_ms),
            exponential_backoff: settings.exponential_backoff,
            acceptable_retry_count: settings.acceptable_retry_count,
        }
    }
}
