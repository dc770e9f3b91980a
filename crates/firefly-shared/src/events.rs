//! # Event Publisher Port (§4.17)
//!
//! `publish(topic, payload)` is fire-and-forget at the core level; delivery
//! guarantees belong to the host. The default implementation logs via
//! `tracing` so events are visible without a message bus attached, mirroring
//! the messaging client's "log the send, delegate the guarantee" posture.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FireflyResult;

/// Topics published by the enrichment and job-lifecycle cores (§4.17).
pub mod topics {
    pub const ENRICHMENT_STARTED: &str = "enrichment.started";
    pub const ENRICHMENT_COMPLETED: &str = "enrichment.completed";
    pub const ENRICHMENT_FAILED: &str = "enrichment.failed";
    pub const CACHE_HIT: &str = "cache.hit";
    pub const QUALITY_EVALUATED: &str = "quality.evaluated";
    pub const LINEAGE_RECORDED: &str = "lineage.recorded";
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_CHECKED: &str = "job.checked";
    pub const JOB_COLLECTED: &str = "job.collected";
    pub const JOB_RESULT: &str = "job.result";
    pub const JOB_STOPPED: &str = "job.stopped";
    pub const JOB_FAILED: &str = "job.failed";
}

#[async_trait]
pub trait EventPublisher: Send + Sync + std::fmt::Debug {
    async fn publish(&self, topic: &str, payload: Value) -> FireflyResult<()>;
}

/// Default publisher: records the event via `tracing` and returns
/// immediately. Used whenever the host hasn't wired a real message bus.
#[derive(Debug, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, topic: &str, payload: Value) -> FireflyResult<()> {
        tracing::debug!(topic, %payload, "publishing event");
        Ok(())
    }
}

/// Test/dev publisher that records every publish call in order for
/// assertions, in place of a real broker.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published: std::sync::Mutex<Vec<(String, Value)>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().expect("publisher mutex poisoned").clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, topic: &str, payload: Value) -> FireflyResult<()> {
        self.published
            .lock()
            .expect("publisher mutex poisoned")
            .push((topic.to_string(), payload));
        Ok(())
    }
}
