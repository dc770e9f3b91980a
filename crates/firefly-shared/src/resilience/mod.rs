//! # Resiliency Layer (§4.1, §5, §7)
//!
//! Five composable layers — bulkhead, rate limiter, circuit breaker, retry,
//! timeout — keyed per `(providerName, operationId)` and composed by
//! [`decorator::ResiliencyDecorator`].

pub mod bulkhead;
pub mod circuit_breaker;
pub mod decorator;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;
pub mod timeout;

pub use bulkhead::{Bulkhead, BulkheadConfig};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerBehavior, CircuitBreakerConfig, CircuitState};
pub use decorator::{ResiliencyConfig, ResiliencyDecorator};
pub use metrics::CircuitBreakerMetrics;
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::RetryConfig;
pub use timeout::TimeoutConfig;
