//! Bounded retry with exponential backoff.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Error, Result};

/// Retry configuration shared by the search and reader adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    /// Base delay used for exponential backoff.
    pub base_delay_ms: u64,
    /// Backoff multiplier applied per retry attempt.
    pub backoff_factor: f64,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl RetryConfig {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32);
        let millis = (self.base_delay_ms as f64 * factor).round().max(0.0) as u64;
        Duration::from_millis(millis)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 200,
            backoff_factor: 2.0,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Run `op` under the per-attempt timeout, retrying transient failures.
///
/// Permanent errors and contract violations pass through on the first
/// occurrence; exhausted retries surface the last transient error.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    op_name: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let outcome = tokio::time::timeout(config.timeout, op()).await;
        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => Error::timeout(config.timeout.as_millis() as u64),
        };

        if !err.is_transient() || attempt >= config.max_retries {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt);
        warn!(
            op = op_name,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient failure, retrying"
        );
        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 1,
            backoff_factor: 2.0,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_is_exponential() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 100,
            backoff_factor: 2.0,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&quick_config(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::transient("svc", "503"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&quick_config(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::permanent("svc", "401")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let result: Result<()> = retry_with_backoff(&quick_config(1), "test", || async {
            Err(Error::transient("svc", "rate limited"))
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_transient() {
        let config = RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
            backoff_factor: 1.0,
            timeout: Duration::from_millis(50),
        };
        let result: Result<()> = retry_with_backoff(&config, "test", || async {
            sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result.unwrap_err(), Error::Timeout { .. }));
    }
}
