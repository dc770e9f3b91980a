//! # Resiliency Decorator (§4.1, §5, §7)
//!
//! Composes the five resiliency layers outside-in around a unit of work:
//! Bulkhead → RateLimiter → CircuitBreaker → Retry → Timeout → Work. State
//! for each layer is keyed per `(providerName, operationId)` and held in a
//! `DashMap` so concurrent callers for distinct keys never contend, while
//! callers sharing a key see linearizable circuit breaker/rate limiter
//! state per §5's atomicity requirement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{FireflyError, FireflyResult};

use super::bulkhead::{Bulkhead, BulkheadConfig};
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerBehavior, CircuitBreakerConfig};
use super::rate_limiter::{RateLimiter, RateLimiterConfig};
use super::retry::{self, RetryConfig};
use super::timeout::{self, TimeoutConfig};

/// Aggregate configuration for one resiliency key. Providers without an
/// override use `ResiliencyConfig::default()`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResiliencyConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub rate_limiter: RateLimiterConfig,
    pub bulkhead: BulkheadConfig,
    pub timeout: TimeoutConfig,
}

/// Per-key resiliency state: one circuit breaker, rate limiter, and
/// bulkhead shared by every call against that `(provider, operation)` pair.
struct KeyState {
    circuit_breaker: CircuitBreaker,
    rate_limiter: RateLimiter,
    bulkhead: Bulkhead,
    retry: RetryConfig,
    timeout: TimeoutConfig,
}

/// Registry of per-key resiliency state plus the composition logic that
/// wraps a unit of work in all five layers.
pub struct ResiliencyDecorator {
    keys: DashMap<String, Arc<KeyState>>,
    default_config: ResiliencyConfig,
    overrides: DashMap<String, ResiliencyConfig>,
}

impl std::fmt::Debug for ResiliencyDecorator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResiliencyDecorator")
            .field("keys", &self.keys.len())
            .finish()
    }
}

fn resiliency_key(provider: &str, operation: &str) -> String {
    format!("{provider}::{operation}")
}

impl ResiliencyDecorator {
    pub fn new(default_config: ResiliencyConfig) -> Self {
        Self {
            keys: DashMap::new(),
            default_config,
            overrides: DashMap::new(),
        }
    }

    /// Install a provider-specific override, consulted the next time that
    /// key's state is lazily created. Does not affect already-created state.
    pub fn set_override(&self, provider: &str, operation: &str, config: ResiliencyConfig) {
        self.overrides.insert(resiliency_key(provider, operation), config);
    }

    fn state_for(&self, provider: &str, operation: &str) -> Arc<KeyState> {
        let key = resiliency_key(provider, operation);
        if let Some(existing) = self.keys.get(&key) {
            return existing.clone();
        }
        let config = self
            .overrides
            .get(&key)
            .map(|c| c.clone())
            .unwrap_or_else(|| self.default_config.clone());
        let state = Arc::new(KeyState {
            circuit_breaker: CircuitBreaker::new(key.clone(), config.circuit_breaker),
            rate_limiter: RateLimiter::new(key.clone(), config.rate_limiter),
            bulkhead: Bulkhead::new(key.clone(), config.bulkhead),
            retry: config.retry,
            timeout: config.timeout,
        });
        self.keys.entry(key).or_insert(state).clone()
    }

    /// Current circuit breaker metrics for a key, if any calls have been
    /// made against it yet. Used by the health/cost discovery handlers.
    pub fn circuit_metrics(
        &self,
        provider: &str,
        operation: &str,
    ) -> Option<super::metrics::CircuitBreakerMetrics> {
        let key = resiliency_key(provider, operation);
        self.keys.get(&key).map(|s| s.circuit_breaker.metrics())
    }

    /// Run `work` wrapped in Bulkhead → RateLimiter → CircuitBreaker → Retry
    /// → Timeout, in that outside-in order.
    pub async fn call<T, F, Fut>(
        &self,
        provider: &str,
        operation: &str,
        work: F,
    ) -> FireflyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = FireflyResult<T>>,
    {
        self.call_observed(provider, operation, |_attempt, _err| {}, work).await
    }

    /// Like [`Self::call`], but `on_retry(attempt, &err)` fires once per
    /// scheduled retry so callers can record an `OPERATION_RETRIED` audit
    /// entry per attempt (§4.1, §8 "audit trail contains K retry entries").
    pub async fn call_observed<T, F, Fut>(
        &self,
        provider: &str,
        operation: &str,
        mut on_retry: impl FnMut(u32, &FireflyError),
        mut work: F,
    ) -> FireflyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = FireflyResult<T>>,
    {
        let state = self.state_for(provider, operation);

        let _bulkhead_permit = state.bulkhead.acquire().await?;
        state.rate_limiter.acquire().await?;

        if !state.circuit_breaker.should_allow() {
            return Err(FireflyError::CircuitOpen(resiliency_key(provider, operation)));
        }

        let circuit_breaker = &state.circuit_breaker;
        let timeout_config = &state.timeout;
        retry::retry_with_hook(
            &state.retry,
            |err: &FireflyError| err.is_retryable(),
            |attempt, err| on_retry(attempt, err),
            || {
                let started = Instant::now();
                async move {
                    let attempt_result =
                        timeout::with_timeout(timeout_config, work()).await;
                    record_outcome(circuit_breaker, &attempt_result, started.elapsed());
                    attempt_result
                }
            },
        )
        .await
    }
}

fn record_outcome<T>(
    circuit_breaker: &CircuitBreaker,
    result: &FireflyResult<T>,
    elapsed: Duration,
) {
    match result {
        Ok(_) => circuit_breaker.record_success(elapsed),
        Err(err) => match err.classify() {
            crate::error::FailureKind::Validation => {}
            _ => circuit_breaker.record_failure(elapsed),
        },
    }
}
