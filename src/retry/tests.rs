//! Integration tests for the retry loop.

use super::*;
use crate::testing::{LogLevel, RecordingLogger, RecordingSleep, SequentialBatchId};
use serde_json::json;
use tracing_test::traced_test;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Operation failing with `"failure N"` until `fail_times` attempts were made.
fn flaky(
    attempts: &Arc<AtomicU32>,
    fail_times: u32,
) -> impl FnMut() -> futures::future::Ready<Result<&'static str, String>> {
    let attempts = attempts.clone();
    move || {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        if n < fail_times {
            futures::future::ready(Err(format!("failure {}", n)))
        } else {
            futures::future::ready(Ok("success"))
        }
    }
}

fn recording_config(logger: &RecordingLogger, sleep: &RecordingSleep) -> RetryConfig<String> {
    RetryConfig::new()
        .with_logger(logger.clone())
        .with_sleep(sleep.clone())
        .with_id_source(SequentialBatchId::new())
}

#[tokio::test]
async fn test_retry_succeeds_on_third_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let sleep = RecordingSleep::new();
    let config = RetryConfig::new().with_sleep(sleep.clone());

    let result = retry(flaky(&attempts, 2), &config).await;

    assert_eq!(result, Ok("success"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(sleep.delays(), vec![Duration::from_millis(200); 2]);
}

#[tokio::test]
async fn test_retry_exhausted_returns_final_error() {
    let attempts = Arc::new(AtomicU32::new(0));
    let config = RetryConfig::new()
        .with_max_retry_count(3)
        .with_sleep(RecordingSleep::new());

    let result = retry(flaky(&attempts, u32::MAX), &config).await;

    assert_eq!(result, Err("failure 3".to_string()));
    assert_eq!(attempts.load(Ordering::SeqCst), 4); // 1 initial + 3 retries
}

#[tokio::test]
async fn test_zero_retries_makes_one_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep).with_max_retry_count(0);

    let result = retry(flaky(&attempts, 1), &config).await;

    assert_eq!(result, Err("failure 0".to_string()));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(sleep.delays().is_empty());
    assert_eq!(logger.levels(), vec![LogLevel::Error]);
    assert_eq!(logger.records(LogLevel::Error)[0].terminal, Some(false));
}

#[tokio::test]
async fn test_terminal_error_short_circuits() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep)
        .with_terminal_error(|e: &String| e == "failure 1");

    let result = retry(flaky(&attempts, u32::MAX), &config).await;

    assert_eq!(result, Err("failure 1".to_string()));
    assert_eq!(attempts.load(Ordering::SeqCst), 2); // 4 of 6 permitted attempts unused
    assert_eq!(sleep.delays().len(), 1);

    let entries = logger.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].level, LogLevel::Warn);
    assert_eq!(entries[1].level, LogLevel::Error);
    assert_eq!(entries[1].error.as_deref(), Some("failure 1"));
    assert_eq!(entries[1].record.terminal, Some(true));
    assert_eq!(entries[1].record.retry_count, 1);
}

#[tokio::test]
async fn test_terminal_on_final_attempt_is_flagged() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep)
        .with_max_retry_count(2)
        .with_terminal_error(|e: &String| e == "failure 2");

    let result = retry(flaky(&attempts, u32::MAX), &config).await;

    assert_eq!(result, Err("failure 2".to_string()));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(logger.records(LogLevel::Error)[0].terminal, Some(true));
}

#[tokio::test]
async fn test_non_terminal_predicate_keeps_retrying() {
    let attempts = Arc::new(AtomicU32::new(0));
    let config = RetryConfig::new()
        .with_sleep(RecordingSleep::new())
        .with_terminal_error(|e: &String| e.contains("fatal"));

    let result = retry(flaky(&attempts, 4), &config).await;

    assert_eq!(result, Ok("success"));
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_exponential_backoff_delays() {
    let attempts = Arc::new(AtomicU32::new(0));
    let sleep = RecordingSleep::new();
    let config = RetryConfig::new()
        .with_interval(Duration::from_millis(100))
        .with_exponential_backoff(true)
        .with_sleep(sleep.clone());

    let _ = retry(flaky(&attempts, 3), &config).await;

    assert_eq!(
        sleep.delays(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
        ]
    );
}

#[tokio::test]
async fn test_fixed_interval_delays() {
    let attempts = Arc::new(AtomicU32::new(0));
    let sleep = RecordingSleep::new();
    let config = RetryConfig::new()
        .with_max_retry_count(3)
        .with_interval(Duration::from_millis(50))
        .with_sleep(sleep.clone());

    let _ = retry(flaky(&attempts, u32::MAX), &config).await;

    // No delay after the final attempt.
    assert_eq!(sleep.delays(), vec![Duration::from_millis(50); 3]);
}

#[tokio::test]
async fn test_acceptable_threshold_suppresses_early_success() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep).with_acceptable_retry_count(2);

    let result = retry(flaky(&attempts, 1), &config).await;

    assert_eq!(result, Ok("success"));
    // Failure at index 0 is below the threshold, success at index 1 is acceptable.
    assert!(logger.is_empty());
}

#[tokio::test]
async fn test_acceptable_threshold_reports_late_success() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep).with_acceptable_retry_count(2);

    let result = retry(flaky(&attempts, 3), &config).await;

    assert_eq!(result, Ok("success"));
    assert_eq!(
        logger.levels(),
        vec![LogLevel::Warn, LogLevel::Info] // index 2 warns, index 3 succeeds late
    );

    let infos = logger.records(LogLevel::Info);
    let info = &infos[0];
    assert_eq!(info.retry_count, 3);
    assert_eq!(info.retry_count_acceptable, Some(2));
    assert_eq!(info.terminal, None);
}

#[tokio::test]
async fn test_success_on_first_attempt_is_silent() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep);

    let result = retry(flaky(&attempts, 0), &config).await;

    assert_eq!(result, Ok("success"));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(logger.is_empty());
    assert!(sleep.delays().is_empty());
}

#[tokio::test]
async fn test_final_failure_logged_below_threshold() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep)
        .with_max_retry_count(1)
        .with_acceptable_retry_count(10);

    let result = retry(flaky(&attempts, u32::MAX), &config).await;

    assert_eq!(result, Err("failure 1".to_string()));
    // Warn at index 0 is suppressed; the final error is always reported.
    assert_eq!(logger.levels(), vec![LogLevel::Error]);
}

#[tokio::test]
async fn test_terminal_failure_logged_below_threshold() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep)
        .with_acceptable_retry_count(3)
        .with_terminal_error(|e: &String| e == "failure 0");

    let result = retry(flaky(&attempts, u32::MAX), &config).await;

    assert_eq!(result, Err("failure 0".to_string()));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(sleep.delays().is_empty());

    let entries = logger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, LogLevel::Error);
    assert_eq!(entries[0].error.as_deref(), Some("failure 0"));
    assert_eq!(entries[0].record.retry_count, 0);
    assert_eq!(entries[0].record.terminal, Some(true));
}

#[tokio::test]
async fn test_batch_id_is_stable_within_a_run() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let config = RetryConfig::new()
        .with_logger(logger.clone())
        .with_sleep(RecordingSleep::new());

    let _ = retry(flaky(&attempts, u32::MAX), &config).await;

    let entries = logger.entries();
    assert_eq!(entries.len(), 6);
    let first = &entries[0].record.retry_batch_id;
    assert!(entries.iter().all(|e| &e.record.retry_batch_id == first));
}

#[tokio::test]
async fn test_batch_id_differs_between_runs() {
    let logger = RecordingLogger::new();
    let config = RetryConfig::new()
        .with_max_retry_count(0)
        .with_logger(logger.clone());

    let _ = retry(|| async { Err::<(), _>("a") }, &config).await;
    let _ = retry(|| async { Err::<(), _>("b") }, &config).await;

    let records = logger.records(LogLevel::Error);
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].retry_batch_id, records[1].retry_batch_id);
}

#[tokio::test]
async fn test_id_source_called_once_per_run() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep);

    let _ = retry(flaky(&attempts, 2), &config).await;
    let _ = retry(flaky(&attempts, 0), &config).await;
    let single = config.clone().with_max_retry_count(0);
    let _ = retry(|| async { Err::<&str, _>("x".to_string()) }, &single).await;

    let ids: Vec<String> = logger
        .entries()
        .into_iter()
        .map(|e| e.record.retry_batch_id)
        .collect();
    // Run 1 warns twice and logs a late success; run 2 is silent.
    assert_eq!(ids, vec!["batch-0", "batch-0", "batch-0", "batch-2"]);
}

#[tokio::test]
async fn test_records_carry_extra_and_counts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep)
        .with_max_retry_count(2)
        .with_log_field("proc", "sayHello");

    let _ = retry(flaky(&attempts, u32::MAX), &config).await;

    let values: Vec<_> = logger
        .entries()
        .iter()
        .map(|e| e.record.to_value())
        .collect();
    assert_eq!(
        values,
        vec![
            json!({ "proc": "sayHello", "retryCount": 0, "retryCountMax": 2, "retryBatchId": "batch-0" }),
            json!({ "proc": "sayHello", "retryCount": 1, "retryCountMax": 2, "retryBatchId": "batch-0" }),
            json!({ "proc": "sayHello", "retryCount": 2, "retryCountMax": 2, "retryBatchId": "batch-0", "terminal": false }),
        ]
    );
}

#[tokio::test]
async fn test_logger_does_not_change_control_flow() {
    let with_logger_attempts = Arc::new(AtomicU32::new(0));
    let without_logger_attempts = Arc::new(AtomicU32::new(0));
    let with_sleep = RecordingSleep::new();
    let without_sleep = RecordingSleep::new();

    let with_logger = RetryConfig::new()
        .with_max_retry_count(4)
        .with_exponential_backoff(true)
        .with_logger(RecordingLogger::new())
        .with_sleep(with_sleep.clone());
    let without_logger = RetryConfig::new()
        .with_max_retry_count(4)
        .with_exponential_backoff(true)
        .with_sleep(without_sleep.clone());

    let a = retry(flaky(&with_logger_attempts, 3), &with_logger).await;
    let b = retry(flaky(&without_logger_attempts, 3), &without_logger).await;

    assert_eq!(a, b);
    assert_eq!(
        with_logger_attempts.load(Ordering::SeqCst),
        without_logger_attempts.load(Ordering::SeqCst)
    );
    assert_eq!(with_sleep.delays(), without_sleep.delays());
}

#[tokio::test]
async fn test_say_hello_scenario() {
    let attempts = Arc::new(AtomicU32::new(0));
    let logger = RecordingLogger::new();
    let sleep = RecordingSleep::new();
    let config = recording_config(&logger, &sleep)
        .with_max_retry_count(3)
        .with_interval(Duration::from_millis(1000))
        .with_exponential_backoff(true);

    let result = retry(flaky(&attempts, 3), &config).await;

    assert_eq!(result, Ok("success"));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert_eq!(
        sleep.delays(),
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(4000),
        ]
    );
    assert_eq!(
        logger.levels(),
        vec![LogLevel::Warn, LogLevel::Warn, LogLevel::Warn, LogLevel::Info]
    );
    assert_eq!(
        logger.records(LogLevel::Info)[0].retry_count_acceptable,
        Some(0)
    );
}

#[tokio::test]
async fn test_error_value_is_returned_unchanged() {
    #[derive(Debug, PartialEq)]
    struct Rejected {
        code: u16,
        body: Vec<u8>,
    }

    let config = RetryConfig::new()
        .with_max_retry_count(1)
        .with_sleep(RecordingSleep::new());

    let result: Result<(), _> = retry(
        || async {
            Err(Rejected {
                code: 503,
                body: b"busy".to_vec(),
            })
        },
        &config,
    )
    .await;

    assert_eq!(
        result,
        Err(Rejected {
            code: 503,
            body: b"busy".to_vec()
        })
    );
}

#[tokio::test]
async fn test_run_method_matches_free_function() {
    let attempts = Arc::new(AtomicU32::new(0));
    let config = RetryConfig::new().with_sleep(RecordingSleep::new());

    let result = config.run(flaky(&attempts, 1)).await;

    assert_eq!(result, Ok("success"));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_default_sleep_uses_tokio_timer() {
    let attempts = Arc::new(AtomicU32::new(0));
    let config = RetryConfig::new()
        .with_interval(Duration::from_millis(100))
        .with_exponential_backoff(true);

    let start = tokio::time::Instant::now();
    let result = retry(flaky(&attempts, 3), &config).await;

    assert_eq!(result, Ok("success"));
    // 100ms + 200ms + 400ms of virtual time
    assert!(start.elapsed() >= Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_around_whole_run() {
    let attempts = Arc::new(AtomicU32::new(0));
    let config = RetryConfig::new().with_interval(Duration::from_secs(60));

    let result = with_timeout(
        Duration::from_secs(90),
        retry(flaky(&attempts, u32::MAX), &config),
    )
    .await;

    assert_eq!(
        result,
        Err(TimeoutError::Elapsed(Duration::from_secs(90)))
    );
    // Attempt 0 at t=0, attempt 1 at t=60s, the next would be at t=120s.
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_runs_share_config() {
    let logger = RecordingLogger::new();
    let config = Arc::new(
        RetryConfig::new()
            .with_max_retry_count(2)
            .with_logger(logger.clone())
            .with_sleep(RecordingSleep::new()),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let config = config.clone();
            tokio::spawn(async move {
                let attempts = Arc::new(AtomicU32::new(0));
                let result = retry(flaky(&attempts, i), &config).await;
                (result, attempts.load(Ordering::SeqCst))
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(outcomes[0], (Ok("success"), 1));
    assert_eq!(outcomes[1], (Ok("success"), 2));
    assert_eq!(outcomes[2], (Ok("success"), 3));
    assert_eq!(outcomes[3], (Err("failure 2".to_string()), 3));

    let mut ids: Vec<_> = logger
        .entries()
        .into_iter()
        .map(|e| e.record.retry_batch_id)
        .collect();
    ids.sort();
    ids.dedup();
    // Runs 1-3 each logged something under their own id.
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
#[traced_test]
async fn test_tracing_logger_reports_a_run() {
    let attempts = Arc::new(AtomicU32::new(0));
    let config = RetryConfig::new()
        .with_max_retry_count(2)
        .with_log_field("proc", "fetchProfile")
        .with_logger(TracingLogger::new().with_operation("fetch_profile"))
        .with_sleep(RecordingSleep::new())
        .with_id_source(SequentialBatchId::new());

    let result = retry(flaky(&attempts, 2), &config).await;

    assert_eq!(result, Ok("success"));
    assert!(logs_contain("fetch_profile failed, retrying"));
    assert!(logs_contain("failure 0"));
    assert!(logs_contain("failure 1"));
    assert!(logs_contain(
        "fetch_profile needed more retries than acceptable to succeed"
    ));
    assert!(logs_contain("retry_batch_id=batch-0"));
    assert!(logs_contain(r#"extra={"proc":"fetchProfile"}"#));
    assert!(!logs_contain("giving up"));

    let exhausted = Arc::new(AtomicU32::new(0));
    let result = retry(flaky(&exhausted, u32::MAX), &config).await;

    assert_eq!(result, Err("failure 2".to_string()));
    assert!(logs_contain("fetch_profile failed, giving up"));
    assert!(logs_contain("terminal=false"));
}
