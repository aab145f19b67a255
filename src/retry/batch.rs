//! Per-invocation retry state and batch identifiers.

use serde_json::{Map, Value};

use crate::retry::log::LogRecord;

/// Produces the identifier shared by every log record of one retry run.
///
/// Called exactly once per invocation of the controller.
pub trait BatchIdSource: Send + Sync {
    /// Generate a fresh identifier.
    fn next_id(&self) -> String;
}

impl<F> BatchIdSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_id(&self) -> String {
        self()
    }
}

/// Random UUID v4 batch ids. The default source.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidBatchId;

impl BatchIdSource for UuidBatchId {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// State of one retry run: its batch id and the current attempt index.
///
/// Attempt 0 is the initial try; every later index is a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBatch {
    id: String,
    attempt: u32,
}

impl RetryBatch {
    /// Start a new batch at attempt 0.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attempt: 0,
        }
    }

    /// The batch identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current attempt index.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Move on to the next attempt.
    pub fn advance(&mut self) {
        self.attempt += 1;
    }

    /// Build the base log record for the current attempt.
    pub fn record(&self, extra: &Map<String, Value>, retry_count_max: u32) -> LogRecord {
        LogRecord::new(extra.clone(), self.attempt, retry_count_max, self.id.clone())
    }
}
