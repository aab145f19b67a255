//! Bounded retries for async operations, with structured logging.
//!
//! The pieces follow a "pure core, imperative shell" split:
//!
//! - **Pure Core**: [`RetryPolicy`] is just data. It computes delays and makes
//!   every retry and logging decision without side effects.
//! - **Shell**: [`retry`] drives the attempt loop, calling the operation, the
//!   logger and the delay primitive.
//! - **Collaborators**: logging ([`RetryLogger`]), batch ids
//!   ([`BatchIdSource`]) and delays ([`Sleep`]) are injected through
//!   [`RetryConfig`].
//!
//! # Quick Start
//!
//! ```rust
//! use retry_with_logger::{retry, RetryConfig, TracingLogger};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let config = RetryConfig::new()
//!     .with_max_retry_count(3)
//!     .with_interval(Duration::from_millis(10))
//!     .with_exponential_backoff(true)
//!     .with_logger(TracingLogger::new().with_operation("ping"));
//!
//! let value = retry(|| async { Ok::<_, String>(42) }, &config).await;
//! assert_eq!(value, Ok(42));
//! # });
//! ```
//!
//! # Delays
//!
//! - **Fixed**: every retry waits `interval`.
//! - **Exponential**: the retry after attempt `k` waits `interval * 2^k`
//!   (100ms, 200ms, 400ms, ...).
//!
//! # Error Types
//!
//! The operation's own error is returned unchanged. [`TimeoutError`] is only
//! produced by [`with_timeout`].

mod batch;
mod config;
mod controller;
mod log;
mod policy;
mod sleep;
mod timeout;

pub use batch::{BatchIdSource, RetryBatch, UuidBatchId};
pub use config::RetryConfig;
pub use controller::retry;
pub use log::{LogRecord, RetryLogger, TracingLogger};
pub use policy::{RetryDecision, RetryPolicy, DEFAULT_INTERVAL, DEFAULT_MAX_RETRY_COUNT};
pub use sleep::{Sleep, TokioSleep};
pub use timeout::{with_timeout, TimeoutError};

#[cfg(test)]
mod tests;
