//! # retry-with-logger
//!
//! Retry a fallible async operation a bounded number of times, and report what
//! happened through a logger of your choice.
//!
//! - Fixed or exponential delay between attempts
//! - Terminal errors that stop retrying immediately
//! - An "acceptable" retry count below which retries stay quiet
//! - Structured log records sharing one batch id per run
//!
//! ## Quick Example
//!
//! ```rust
//! use retry_with_logger::{retry, RetryConfig, TracingLogger};
//! use std::time::Duration;
//!
//! #[derive(Debug, PartialEq)]
//! enum ApiError {
//!     Unauthorized,
//!     Unavailable,
//! }
//!
//! impl std::fmt::Display for ApiError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let config = RetryConfig::new()
//!     .with_max_retry_count(3)
//!     .with_interval(Duration::from_millis(5))
//!     .with_terminal_error(|e: &ApiError| *e == ApiError::Unauthorized)
//!     .with_log_field("proc", "load_account")
//!     .with_logger(TracingLogger::new().with_operation("load_account"));
//!
//! // Unauthorized is terminal: one attempt, no retries.
//! let result: Result<(), _> = retry(|| async { Err(ApiError::Unauthorized) }, &config).await;
//! assert_eq!(result, Err(ApiError::Unauthorized));
//! # });
//! ```
//!
//! See `demos/say_hello.rs` for a wrapper that tags every record with the
//! calling procedure.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod retry;
pub mod testing;

// Re-exports
pub use retry::{
    retry, with_timeout, BatchIdSource, LogRecord, RetryConfig, RetryDecision, RetryLogger,
    RetryPolicy, Sleep, TimeoutError, TokioSleep, TracingLogger, UuidBatchId,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{
        retry, with_timeout, LogRecord, RetryConfig, RetryLogger, RetryPolicy, TimeoutError,
        TracingLogger,
    };
}
