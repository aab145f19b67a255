//! Testing utilities for code that retries.
//!
//! Test doubles for the three collaborators of a retry run, so tests can
//! assert on log output and delays without waiting on real timers.
//!
//! # Examples
//!
//! ```rust
//! use retry_with_logger::testing::{LogLevel, RecordingLogger, RecordingSleep};
//! use retry_with_logger::{retry, RetryConfig};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let logger = RecordingLogger::new();
//! let sleep = RecordingSleep::new();
//!
//! let config = RetryConfig::new()
//!     .with_max_retry_count(2)
//!     .with_logger(logger.clone())
//!     .with_sleep(sleep.clone());
//!
//! let result: Result<(), _> = retry(|| async { Err("offline") }, &config).await;
//!
//! assert_eq!(result, Err("offline"));
//! assert_eq!(sleep.delays(), vec![Duration::from_millis(200); 2]);
//! assert_eq!(
//!     logger.levels(),
//!     vec![LogLevel::Warn, LogLevel::Warn, LogLevel::Error]
//! );
//! # });
//! ```

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

use crate::retry::{BatchIdSource, LogRecord, RetryLogger, Sleep};

/// Which logger method was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// `RetryLogger::info`
    Info,
    /// `RetryLogger::warn`
    Warn,
    /// `RetryLogger::error`
    Error,
}

/// One captured logger call.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// The method that was called.
    pub level: LogLevel,
    /// The error rendered with `Display`, for warn and error calls.
    pub error: Option<String>,
    /// The record passed to the logger.
    pub record: LogRecord,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Logger that keeps every call in memory.
///
/// Clones share the same buffer, so keep one clone for assertions and hand
/// another to the configuration.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RecordingLogger {
    /// Create an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured calls, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).clone()
    }

    /// Levels of all captured calls, oldest first.
    pub fn levels(&self) -> Vec<LogLevel> {
        lock(&self.entries).iter().map(|e| e.level).collect()
    }

    /// Captured records at `level`.
    pub fn records(&self, level: LogLevel) -> Vec<LogRecord> {
        lock(&self.entries)
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Returns true if nothing was logged.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    fn push(&self, level: LogLevel, error: Option<String>, record: &LogRecord) {
        lock(&self.entries).push(LogEntry {
            level,
            error,
            record: record.clone(),
        });
    }
}

impl<E: Display + ?Sized> RetryLogger<E> for RecordingLogger {
    fn info(&self, record: &LogRecord) {
        self.push(LogLevel::Info, None, record);
    }

    fn warn(&self, error: &E, record: &LogRecord) {
        self.push(LogLevel::Warn, Some(error.to_string()), record);
    }

    fn error(&self, error: &E, record: &LogRecord) {
        self.push(LogLevel::Error, Some(error.to_string()), record);
    }
}

/// Delay primitive that records each requested delay and returns at once.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleep {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleep {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested delays, in order.
    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.delays).clone()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        lock(&self.delays).iter().sum()
    }
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        lock(&self.delays).push(duration);
        future::ready(()).boxed()
    }
}

/// Deterministic batch ids: `batch-0`, `batch-1`, ...
#[derive(Debug, Default)]
pub struct SequentialBatchId {
    next: AtomicU64,
}

impl SequentialBatchId {
    /// Start counting from zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchIdSource for SequentialBatchId {
    fn next_id(&self) -> String {
        format!("batch-{}", self.next.fetch_add(1, Ordering::SeqCst))
    }
}
