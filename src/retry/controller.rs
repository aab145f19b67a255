//! The retry loop.

use std::future::Future;

use crate::retry::batch::RetryBatch;
use crate::retry::config::RetryConfig;
use crate::retry::policy::RetryDecision;

/// Run `operation`, retrying failures as `config` allows.
///
/// `operation` is a factory: every attempt calls it for a fresh future, so a
/// retry means "try this again from scratch" (new connection, new request).
/// It is invoked at most `max_retry_count + 1` times, one attempt at a time.
///
/// Resolves with the value of the first attempt that succeeds, or with the
/// error of the attempt that ended the run: a terminal error, or any error on
/// the last permitted attempt. The error is returned exactly as the operation
/// produced it.
///
/// # Logging
///
/// With a logger configured, each run gets one batch id and:
/// - a success after more than `acceptable_retry_count` retries calls `info`;
/// - a failure that will be retried calls `warn`, once the attempt index has
///   reached `acceptable_retry_count`;
/// - the failure that ends the run calls `error` with its `terminal` flag.
///
/// # Example
///
/// ```rust
/// use retry_with_logger::{retry, RetryConfig};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let calls = &AtomicU32::new(0);
/// let config = RetryConfig::new().with_interval(Duration::from_millis(1));
///
/// let greeting = retry(
///     move || async move {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err("not yet")
///         } else {
///             Ok("hello")
///         }
///     },
///     &config,
/// )
/// .await;
///
/// assert_eq!(greeting, Ok("hello"));
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # });
/// ```
pub async fn retry<T, E, F, Fut>(mut operation: F, config: &RetryConfig<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let policy = config.policy();
    let logger = config.logger();
    let mut batch = RetryBatch::new(config.next_batch_id());

    loop {
        let attempt = batch.attempt();

        // Everything from the failed attempt is dropped before the delay.
        let delay = {
            let record = batch.record(config.extra_log_data(), policy.max_retry_count());

            let error = match operation().await {
                Ok(value) => {
                    if let Some(logger) = logger {
                        if policy.should_log_success(attempt) {
                            logger.info(
                                &record
                                    .with_retry_count_acceptable(policy.acceptable_retry_count()),
                            );
                        }
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let decision = policy.decide(attempt, config.is_terminal(&error));

            if let Some(logger) = logger {
                if policy.should_log_failure(attempt, decision.will_retry()) {
                    match decision {
                        RetryDecision::GiveUp { terminal } => {
                            logger.error(&error, &record.with_terminal(terminal))
                        }
                        RetryDecision::Retry { .. } => logger.warn(&error, &record),
                    }
                }
            }

            match decision {
                RetryDecision::GiveUp { terminal } => {
                    tracing::debug!(
                        retry_batch_id = batch.id(),
                        retry_count = attempt,
                        terminal,
                        "retry run failed"
                    );
                    return Err(error);
                }
                RetryDecision::Retry { delay } => delay,
            }
        };

        tracing::debug!(
            retry_batch_id = batch.id(),
            retry_count = attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling retry"
        );
        config.sleep(delay).await;
        batch.advance();
    }
}
