//! # Bulkhead (§4.1, §7)
//!
//! Bounds the number of concurrent in-flight calls per `(providerName,
//! operationId)` using a counting semaphore, so one slow provider can't
//! starve every other caller of worker threads.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{FireflyError, FireflyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkheadConfig {
    pub max_concurrent_calls: usize,
    pub max_wait: Duration,
}

impl Default for BulkheadConfig {
    /// `max-concurrent-calls=25`, `max-wait-duration=500ms`.
    fn default() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_wait: Duration::from_millis(500),
        }
    }
}

/// Semaphore-backed concurrency limiter.
#[derive(Debug)]
pub struct Bulkhead {
    name: String,
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, config: BulkheadConfig) -> Self {
        Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_calls)),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquire a permit, waiting up to `config.max_wait`. The returned
    /// permit releases the slot on drop.
    pub async fn acquire(&self) -> FireflyResult<SemaphorePermit<'_>> {
        match tokio::time::timeout(self.config.max_wait, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(FireflyError::Fatal(format!(
                "bulkhead {} semaphore closed",
                self.name
            ))),
            Err(_) => Err(FireflyError::BulkheadFull(self.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_permit_when_capacity_available() {
        let bulkhead = Bulkhead::new(
            "test",
            BulkheadConfig {
                max_concurrent_calls: 2,
                max_wait: Duration::from_millis(50),
            },
        );
        let _permit = bulkhead.acquire().await.expect("permit available");
        assert_eq!(bulkhead.available_permits(), 1);
    }

    #[tokio::test]
    async fn rejects_when_saturated_and_wait_elapses() {
        let bulkhead = Bulkhead::new(
            "test",
            BulkheadConfig {
                max_concurrent_calls: 1,
                max_wait: Duration::from_millis(20),
            },
        );
        let _held = bulkhead.acquire().await.expect("first permit available");
        let result = bulkhead.acquire().await;
        assert!(matches!(result, Err(FireflyError::BulkheadFull(_))));
    }

    #[tokio::test]
    async fn releases_permit_on_drop() {
        let bulkhead = Bulkhead::new(
            "test",
            BulkheadConfig {
                max_concurrent_calls: 1,
                max_wait: Duration::from_millis(50),
            },
        );
        {
            let _permit = bulkhead.acquire().await.expect("permit available");
            assert_eq!(bulkhead.available_permits(), 0);
        }
        assert_eq!(bulkhead.available_permits(), 1);
    }
}
