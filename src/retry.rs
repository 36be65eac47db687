//! Retry logic with exponential backoff.
//!
//! Only transient failures (e.g. store rate limiting) are retried; fatal
//! errors surface immediately. Attempts are bounded — an exhausted retry
//! budget propagates the last error to the caller, never drops it.
//!
//! # Example
//!
//! ```
//! use csv_sync::retry::RetryConfig;
//! use std::time::Duration;
//!
//! let store = RetryConfig::store();
//! assert_eq!(store.max_attempts, 5);
//! assert_eq!(store.initial_delay, Duration::from_millis(200));
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Errors that can classify themselves as worth retrying.
pub trait Transient {
    /// Whether the failure is expected to resolve itself on retry.
    fn is_transient(&self) -> bool;
}

/// Configuration for operation retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::store()
    }
}

impl RetryConfig {
    /// Remote-store preset: 5 attempts with exponential backoff.
    /// Matches the store's rate-limit recovery window.
    #[must_use]
    pub fn store() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            factor: 2.0,
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }
}

/// Run `operation`, retrying transient failures up to the configured bound.
pub async fn retry_transient<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + Transient,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempts > 0 {
                    info!(
                        "Operation '{}' succeeded after {} retries",
                        operation_name, attempts
                    );
                }
                return Ok(val);
            }
            Err(err) => {
                attempts += 1;

                if !err.is_transient() || attempts >= config.max_attempts {
                    return Err(err);
                }

                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempts, config.max_attempts, err, delay
                );
                crate::metrics::record_retry(operation_name);

                sleep(delay).await;
                delay = (delay.mul_f64(config.factor)).min(config.max_delay);
            }
        }
    }
}
