//! Retry logic with exponential backoff
//!
//! Every call against the remote service goes through [`call_with_retry`],
//! which bounds the number of attempts, optionally bounds each attempt with
//! a timeout, and spaces attempts with exponential backoff plus jitter.
//!
//! # Example
//!
//! ```no_run
//! use remote_dl::config::RetryConfig;
//! use remote_dl::error::RemoteError;
//! use remote_dl::retry::call_with_retry;
//!
//! # async fn example() -> Result<(), RemoteError> {
//! let config = RetryConfig::default();
//! let version = call_with_retry(&config, "get_version", || async {
//!     Ok::<_, RemoteError>("2.0".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::RemoteError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, dropped connections, a busy device) should return `true`.
/// Permanent failures (rejected requests, missing session) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for RemoteError {
    fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::Timeout { .. } => true,
            RemoteError::DeviceUnavailable(_) => true,
            // 5xx-style answers are the service being overloaded
            RemoteError::Api { code, .. } => *code >= 500,
            RemoteError::NotConnected => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result or the last error after all retry attempts are exhausted.
/// Non-retryable errors are returned immediately.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
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

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
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

/// Call a remote operation through the retrying wrapper
///
/// When `config.call_timeout` is set, each attempt is bounded by it and an
/// expired attempt counts as a retryable [`RemoteError::Timeout`].
pub async fn call_with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation: &str,
    mut call: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let call_timeout = config.call_timeout;
    retry_with_backoff(config, || {
        let fut = call();
        async move {
            match call_timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(RemoteError::Timeout {
                        operation: operation.to_string(),
                    }),
                },
                None => fut.await,
            }
        }
    })
    .await
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
