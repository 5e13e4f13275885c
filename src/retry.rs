//! Retry logic with exponential backoff
//!
//! Sub-resource fetches in concurrent mode are retried through this module.
//! Only transient failures (remote status, transport, timeout) are retried;
//! invalid input and schema mismatches fail immediately.
//!
//! # Example
//!
//! ```no_run
//! use pokeapi_pipeline::retry::{IsRetryable, fetch_with_retry};
//! use pokeapi_pipeline::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = fetch_with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (server errors, timeouts, connection resets) should return `true`.
/// Permanent failures (bad input, schema mismatch, local disk errors) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Status and transport failures, including timeouts
            Error::RemoteFetch { .. } => true,
            // Validated before I/O, retrying cannot help
            Error::InvalidArgument { .. } => false,
            // Schema mismatch is not transient
            Error::MalformedPayload { .. } => false,
            Error::Io(_) => false,
            Error::Serialization(_) => false,
            Error::Config { .. } => false,
            Error::Cache(_) => false,
            Error::Stage { source, .. } => source.is_retryable(),
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation runs once, then up to `config.max_attempts` more times while
/// it keeps failing with a retryable error.
///
/// # Returns
///
/// Returns the successful result or the last error after all retry attempts are exhausted.
pub async fn fetch_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::time::sleep(jittered_delay).await;

                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Scale `delay` by the backoff multiplier, capped at `max_delay`
///
/// A product that does not fit in a `Duration` (or is not a finite positive
/// number) saturates at `max_delay`.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::try_from_secs_f64(jittered_secs).unwrap_or(delay)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_success_no_retry() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = fetch_with_retry(&fast_config(1), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "should only call once");
    }

    #[tokio::test]
    async fn test_single_retry_then_succeed() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = fetch_with_retry(&fast_config(1), || {
            let counter = counter_clone.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::remote("http://example.test/pokemon/1/", Some(500), "boom"))
                } else {
                    Ok("forms")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "forms");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_retry_exhausted() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = fetch_with_retry(&fast_config(1), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::remote("http://example.test/x", None, "timed out"))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::RemoteFetch { .. })));
        assert_eq!(
            counter.load(Ordering::SeqCst),
            2,
            "should try initial + 1 retry"
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = fetch_with_retry(&fast_config(3), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::malformed("forms", "is missing"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(
            counter.load(Ordering::SeqCst),
            1,
            "should not retry permanent error"
        );
    }

    #[tokio::test]
    async fn test_exponential_backoff() {
        let start = std::time::Instant::now();

        let _result = fetch_with_retry(&fast_config(3), || async {
            Err::<(), _>(Error::remote("http://example.test/x", Some(503), "busy"))
        })
        .await;

        let elapsed = start.elapsed();

        // 10ms + 20ms + 40ms
        assert!(
            elapsed >= Duration::from_millis(70),
            "should wait at least 70ms, waited {:?}",
            elapsed
        );
        assert!(
            elapsed < Duration::from_secs(2),
            "should not wait too long, waited {:?}",
            elapsed
        );
    }

    #[test]
    fn test_next_delay_saturates_at_max_delay() {
        let mut config = fast_config(1);
        config.max_delay = Duration::from_millis(50);

        assert_eq!(
            next_delay(Duration::from_millis(10), &config),
            Duration::from_millis(20)
        );
        assert_eq!(
            next_delay(Duration::from_millis(40), &config),
            Duration::from_millis(50)
        );

        for multiplier in [1e308, f64::INFINITY, f64::NAN] {
            config.backoff_multiplier = multiplier;
            assert_eq!(
                next_delay(Duration::from_millis(10), &config),
                Duration::from_millis(50)
            );
        }
    }

    #[tokio::test]
    async fn test_huge_multiplier_does_not_panic() {
        let mut config = fast_config(2);
        config.backoff_multiplier = 1e308;
        config.max_delay = Duration::from_millis(20);

        let counter = AtomicU32::new(0);
        let result = fetch_with_retry(&config, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::remote("http://example.test/x", Some(503), "busy"))
        })
        .await;

        assert!(matches!(result, Err(Error::RemoteFetch { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_add_jitter_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..100 {
            let jittered = add_jitter(delay);
            assert!(jittered >= delay);
            assert!(jittered <= delay * 2);
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::remote("u", Some(500), "x").is_retryable());
        assert!(!Error::invalid_argument(0, "x").is_retryable());
        assert!(!Error::Io(std::io::Error::other("disk")).is_retryable());
        assert!(
            Error::Stage {
                key: 2,
                stage: crate::types::Stage::FetchSecondary,
                source: Box::new(Error::remote("u", None, "x")),
            }
            .is_retryable()
        );
    }
}
