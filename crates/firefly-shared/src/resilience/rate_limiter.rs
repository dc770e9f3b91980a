//! # Rate Limiter (§4.1, §7)
//!
//! Token bucket keyed per `(providerName, operationId)`. Refills
//! continuously based on elapsed wall-clock time rather than a ticking
//! background task, so idle buckets cost nothing between calls.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{FireflyError, FireflyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub capacity: f64,
    pub refill_per_second: f64,
    pub max_wait: Duration,
}

impl Default for RateLimiterConfig {
    /// `limit-for-period=100`, `limit-refresh-period=1s`, `timeout-duration=5s`.
    fn default() -> Self {
        Self {
            capacity: 100.0,
            refill_per_second: 100.0,
            max_wait: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter. `try_acquire` never blocks; `acquire` waits up
/// to `config.max_wait` for a token to become available.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    config: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        let capacity = config.capacity;
        Self {
            name: name.into(),
            config,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_per_second)
            .min(self.config.capacity);
        bucket.last_refill = now;
    }

    /// Take one token immediately, or return `false` without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().expect("rate limiter mutex poisoned");
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait (polling at a short interval) for a token up to `max_wait`,
    /// failing with `FireflyError::RateLimited` on timeout.
    pub async fn acquire(&self) -> FireflyResult<()> {
        let deadline = Instant::now() + self.config.max_wait;
        loop {
            if self.try_acquire() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(FireflyError::RateLimited(self.name.clone()));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock().expect("rate limiter mutex poisoned");
        self.refill(&mut bucket);
        bucket.tokens
    }
}
