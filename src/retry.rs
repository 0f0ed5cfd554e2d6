//! Retry logic with exponential backoff
//!
//! Page requests against the search API are retried on transient failures.
//! A retry always re-issues the same cursor position, so pages that were
//! already accumulated are never fetched twice.
//!
//! # Example
//!
//! ```no_run
//! use confluence_offline_copy::config::RetryConfig;
//! use confluence_offline_copy::retry::fetch_with_retry;
//! use confluence_offline_copy::{Error, Result};
//!
//! # async fn example() -> Result<()> {
//! let config = RetryConfig::default();
//! let url = "https://wiki.example.com/rest/api/search?cql=type%3Dpage";
//!
//! // 5xx, 408 and 429 answers are retried; any other status is returned as is
//! let body = fetch_with_retry(&config, || async {
//!     let response = reqwest::get(url).await?;
//!     let status = response.status().as_u16();
//!     if status >= 400 {
//!         return Err(Error::HttpStatus {
//!             status,
//!             url: url.to_string(),
//!             body: String::new(),
//!         });
//!     }
//!     Ok(response.text().await?)
//! })
//! .await?;
//! # let _ = body;
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
/// Transient failures (timeouts, throttling, gateway errors) should return `true`.
/// Permanent failures (bad credentials, malformed responses, missing pages) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// HTTP statuses worth another attempt: request timeout, throttling and server-side errors
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..=599).contains(&status)
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Browser crashes are not retried here; the task timeout bounds them instead
            Error::Render(_) | Error::ExternalTool(_) => false,
            Error::Config { .. } => false,
            Error::InvalidUrl(_) => false,
            Error::InvalidRecord(_) => false,
            Error::Timeout { .. } => false,
            Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// # Arguments
///
/// * `config` - Retry configuration (max attempts, delays, backoff multiplier, jitter)
/// * `operation` - Async closure that returns Result<T, E> where E implements IsRetryable
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
                    tracing::info!(attempts = attempt + 1, "Request succeeded after retry");
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
                    "Request failed, retrying"
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
                        "Request failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Request failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
