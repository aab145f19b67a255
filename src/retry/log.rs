//! Structured log records and the pluggable logger interface.
//!
//! The controller reports through a [`RetryLogger`], a capability set of three
//! methods. Any sink can implement it: a console printer, a crash reporter,
//! a framework logger. [`TracingLogger`] forwards to `tracing`.

use std::sync::Arc;

use serde_json::{Map, Value};

/// Context attached to every logger call.
///
/// Rendered as JSON by [`LogRecord::to_value`], the record looks like
/// `{ ...extra, "retryCount", "retryCountMax", "retryBatchId" }` plus
/// `"retryCountAcceptable"` on info records and `"terminal"` on error records.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Caller-supplied fields, merged into every record.
    pub extra: Map<String, Value>,
    /// Attempt index, 0 for the initial try.
    pub retry_count: u32,
    /// The configured maximum retry count.
    pub retry_count_max: u32,
    /// Identifier shared by every record of one retry run.
    pub retry_batch_id: String,
    /// The acceptable retry count; set on info records only.
    pub retry_count_acceptable: Option<u32>,
    /// Whether the error was classified terminal; set on error records only.
    pub terminal: Option<bool>,
}

impl LogRecord {
    /// Create a base record for one attempt.
    pub fn new(
        extra: Map<String, Value>,
        retry_count: u32,
        retry_count_max: u32,
        retry_batch_id: impl Into<String>,
    ) -> Self {
        Self {
            extra,
            retry_count,
            retry_count_max,
            retry_batch_id: retry_batch_id.into(),
            retry_count_acceptable: None,
            terminal: None,
        }
    }

    /// Extend the record for an info call.
    pub fn with_retry_count_acceptable(mut self, acceptable: u32) -> Self {
        self.retry_count_acceptable = Some(acceptable);
        self
    }

    /// Extend the record for an error call.
    pub fn with_terminal(mut self, terminal: bool) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Render the record as a flat JSON object.
    ///
    /// Extra fields come first; the controller's own fields overwrite any extra
    /// field with the same key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_with_logger::LogRecord;
    /// use serde_json::{json, Map};
    ///
    /// let mut extra = Map::new();
    /// extra.insert("proc".into(), json!("sayHello"));
    ///
    /// let record = LogRecord::new(extra, 2, 5, "batch").with_terminal(false);
    ///
    /// assert_eq!(
    ///     record.to_value(),
    ///     json!({
    ///         "proc": "sayHello",
    ///         "retryCount": 2,
    ///         "retryCountMax": 5,
    ///         "retryBatchId": "batch",
    ///         "terminal": false,
    ///     })
    /// );
    /// ```
    pub fn to_value(&self) -> Value {
        let mut fields = self.extra.clone();
        fields.insert("retryCount".into(), Value::from(self.retry_count));
        fields.insert("retryCountMax".into(), Value::from(self.retry_count_max));
        fields.insert(
            "retryBatchId".into(),
            Value::from(self.retry_batch_id.as_str()),
        );
        if let Some(acceptable) = self.retry_count_acceptable {
            fields.insert("retryCountAcceptable".into(), Value::from(acceptable));
        }
        if let Some(terminal) = self.terminal {
            fields.insert("terminal".into(), Value::from(terminal));
        }
        Value::Object(fields)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for LogRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.to_value(), serializer)
    }
}

/// Sink for retry outcomes.
///
/// Calls are synchronous and their results are ignored; a logger cannot
/// influence whether an operation is retried. A logger is free to drop records,
/// for instance error records whose `terminal` flag is set.
pub trait RetryLogger<E: ?Sized>: Send + Sync {
    /// The operation succeeded, but needed more retries than acceptable.
    fn info(&self, record: &LogRecord);

    /// The operation failed and will be retried.
    fn warn(&self, error: &E, record: &LogRecord);

    /// The operation failed and the error is handed back to the caller.
    fn error(&self, error: &E, record: &LogRecord);
}

impl<E: ?Sized, L: RetryLogger<E> + ?Sized> RetryLogger<E> for Arc<L> {
    fn info(&self, record: &LogRecord) {
        (**self).info(record)
    }

    fn warn(&self, error: &E, record: &LogRecord) {
        (**self).warn(error, record)
    }

    fn error(&self, error: &E, record: &LogRecord) {
        (**self).error(error, record)
    }
}

impl<E: ?Sized, L: RetryLogger<E> + ?Sized> RetryLogger<E> for Box<L> {
    fn info(&self, record: &LogRecord) {
        (**self).info(record)
    }

    fn warn(&self, error: &E, record: &LogRecord) {
        (**self).warn(error, record)
    }

    fn error(&self, error: &E, record: &LogRecord) {
        (**self).error(error, record)
    }
}

/// Logger that emits `tracing` events at the matching level.
///
/// Each event carries `retry_batch_id`, `retry_count` and `retry_count_max`,
/// the error (through `Display`) where there is one, and the extra fields as a
/// JSON string under `extra`.
///
/// # Examples
///
/// ```rust
/// use retry_with_logger::{RetryConfig, TracingLogger};
///
/// // Known terminal errors are expected; don't report them.
/// let config = RetryConfig::<std::io::Error>::new()
///     .with_logger(TracingLogger::new().with_operation("fetch_user").skip_terminal());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    operation: Option<String>,
    skip_terminal: bool,
}

impl TracingLogger {
    /// Create a logger reporting every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the operation in every event.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Drop error records for errors classified terminal.
    pub fn skip_terminal(mut self) -> Self {
        self.skip_terminal = true;
        self
    }

    fn operation(&self) -> &str {
        self.operation.as_deref().unwrap_or("operation")
    }
}

impl<E: std::fmt::Display + ?Sized> RetryLogger<E> for TracingLogger {
    fn info(&self, record: &LogRecord) {
        let extra = Value::Object(record.extra.clone());
        tracing::info!(
            operation = self.operation(),
            retry_batch_id = %record.retry_batch_id,
            retry_count = record.retry_count,
            retry_count_max = record.retry_count_max,
            retry_count_acceptable = record.retry_count_acceptable.unwrap_or_default(),
            extra = %extra,
            "{} needed more retries than acceptable to succeed",
            self.operation()
        );
    }

    fn warn(&self, error: &E, record: &LogRecord) {
        let extra = Value::Object(record.extra.clone());
        tracing::warn!(
            operation = self.operation(),
            retry_batch_id = %record.retry_batch_id,
            retry_count = record.retry_count,
            retry_count_max = record.retry_count_max,
            extra = %extra,
            error = %error,
            "{} failed, retrying",
            self.operation()
        );
    }

    fn error(&self, error: &E, record: &LogRecord) {
        let terminal = record.terminal.unwrap_or_default();
        if terminal && self.skip_terminal {
            return;
        }
        let extra = Value::Object(record.extra.clone());
        tracing::error!(
            operation = self.operation(),
            retry_batch_id = %record.retry_batch_id,
            retry_count = record.retry_count,
            retry_count_max = record.retry_count_max,
            terminal,
            extra = %extra,
            error = %error,
            "{} failed, giving up",
            self.operation()
        );
    }
}
