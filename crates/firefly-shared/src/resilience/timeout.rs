//! # Timeout Guard (§4.1, §7)
//!
//! Innermost resiliency layer: wraps the unit of work with a deadline and
//! maps elapsed deadlines onto `FireflyError::Timeout`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FireflyError, FireflyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
        }
    }
}

/// Run `work` under `config.duration`, converting an elapsed deadline into
/// `FireflyError::Timeout`. Errors returned by `work` itself pass through
/// unchanged.
pub async fn with_timeout<T, F>(config: &TimeoutConfig, work: F) -> FireflyResult<T>
where
    F: std::future::Future<Output = FireflyResult<T>>,
{
    match tokio::time::timeout(config.duration, work).await {
        Ok(result) => result,
        Err(_) => Err(FireflyError::Timeout(config.duration)),
    }
}
