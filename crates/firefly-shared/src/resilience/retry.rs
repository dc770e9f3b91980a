//! # Retry Policy (§4.1, §7)
//!
//! Exponential backoff with jitter, retrying only errors the caller's
//! classifier marks retryable. Applied innermost of the five resiliency
//! layers, directly around the unit of work.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    /// Fixed 5s delay by default (`backoff_multiplier = 1.0`); set a
    /// multiplier > 1.0 to switch to exponential backoff.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 1.0,
            jitter_factor: 0.2,
        }
    }
}

/// Compute the delay before retry attempt `attempt` (1-based: the delay
/// before the *second* call is `backoff_for(1)`), with full jitter applied
/// as `delay * (1 +/- jitter_factor)`.
pub fn backoff_for(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
    let base = (config.initial_backoff.as_secs_f64() * exp).min(config.max_backoff.as_secs_f64());
    let jitter_span = base * config.jitter_factor;
    let jitter = (fastrand::f64() * 2.0 - 1.0) * jitter_span;
    let with_jitter = (base + jitter).max(0.0);
    Duration::from_secs_f64(with_jitter)
}

/// Retry an async operation up to `config.max_attempts` times, calling
/// `is_retryable` on each error to decide whether another attempt is
/// warranted. Returns the last error if attempts are exhausted or the
/// first non-retryable error encountered.
pub async fn retry<T, E, F, Fut>(
    config: &RetryConfig,
    is_retryable: impl FnMut(&E) -> bool,
    work: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    retry_with_hook(config, is_retryable, |_attempt, _err| {}, work).await
}

/// Like [`retry`], but `on_retry(attempt, &err)` is invoked once per
/// scheduled retry (not on the final, unretried failure), so a caller can
/// emit an `OPERATION_RETRIED` audit entry per attempt (§4.1).
pub async fn retry_with_hook<T, E, F, Fut>(
    config: &RetryConfig,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut on_retry: impl FnMut(u32, &E),
    mut work: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match work().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                on_retry(attempt, &err);
                let delay = backoff_for(config, attempt);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_exponentially_within_max() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            backoff_multiplier: 2.0,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            ..Default::default()
        };
        let first = backoff_for(&config, 1);
        let second = backoff_for(&config, 2);
        let third = backoff_for(&config, 3);
        assert!(second > first);
        assert!(third > second);
        assert!(third <= config.max_backoff);
    }

    #[test]
    fn backoff_never_exceeds_max_backoff() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            max_backoff: Duration::from_millis(500),
            ..Default::default()
        };
        let far = backoff_for(&config, 20);
        assert!(far <= config.max_backoff);
    }

    #[tokio::test]
    async fn retries_retryable_errors_until_success() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let result: Result<u32, &str> = retry(
            &config,
            |_| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default();
        let result: Result<u32, &str> = retry(
            &config,
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
        )
        .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let result: Result<u32, &str> = retry(
            &config,
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("always") }
            },
        )
        .await;
        assert_eq!(result, Err("always"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
