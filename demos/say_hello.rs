//! Say Hello Example
//!
//! Wraps `retry` in a per-procedure helper, the way an application usually
//! adopts it: every record gets a `proc` field, and known terminal errors are
//! not reported.
//!
//! Run with: cargo run --example say_hello

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use retry_with_logger::{retry, RetryConfig, TracingLogger};

#[derive(Debug)]
struct GreetError(String);

impl std::fmt::Display for GreetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Retry `operation` under `config`, tagging every record with `proc`.
async fn retry_proc<T, E, F, Fut>(proc: &str, operation: F, config: RetryConfig<E>) -> Result<T, E>
where
    E: std::fmt::Display + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let config = config
        .with_log_field("proc", proc)
        .with_logger(TracingLogger::new().with_operation(proc).skip_terminal());
    retry(operation, &config).await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let error_number = &AtomicU32::new(0);

    let did_say_hello = retry_proc(
        "sayHello",
        move || async move {
            let n = error_number.load(Ordering::SeqCst);
            if n < 3 {
                error_number.fetch_add(1, Ordering::SeqCst);
                return Err(GreetError(format!("errorNumber: {}", n)));
            }
            println!("hello");
            Ok(true)
        },
        RetryConfig::new()
            .with_exponential_backoff(true)
            .with_interval(Duration::from_millis(1000)),
    )
    .await;

    println!("didSayHello: {}", did_say_hello.unwrap_or(false));
}
