//! # Job Execution Result Service (§3 `JobExecutionResult`, §4.16)
//!
//! One upsert-by-`executionId` row per job execution, covering both the
//! raw orchestrator payload and the mapped DTO once RESULT has run. Mirrors
//! `firefly_shared::audit`'s append-vs-upsert split: the audit trail is
//! append-only, this store is keyed and upserted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use firefly_shared::error::FireflyResult;
use firefly_shared::hashing;

use crate::model::JobExecutionStatus;

/// §3 `JobExecutionResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionResult {
    pub result_id: Uuid,
    pub execution_id: String,
    pub request_id: Option<String>,
    pub job_type: String,
    pub status: JobExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_millis: Option<i64>,
    pub raw_output: Option<Value>,
    pub transformed_output: Option<Value>,
    pub target_dto_class: Option<String>,
    pub mapper_name: Option<String>,
    pub error_message: Option<String>,
    pub progress_percentage: Option<u8>,
    pub retry_attempts: Option<u32>,
    pub cacheable: bool,
    pub ttl_seconds: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub data_size_bytes: Option<u64>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl JobExecutionResult {
    pub fn new_running(execution_id: impl Into<String>, job_type: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            result_id: Uuid::new_v4(),
            execution_id: execution_id.into(),
            request_id,
            job_type: job_type.into(),
            status: JobExecutionStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            duration_millis: None,
            raw_output: None,
            transformed_output: None,
            target_dto_class: None,
            mapper_name: None,
            error_message: None,
            progress_percentage: None,
            retry_attempts: None,
            cacheable: true,
            ttl_seconds: None,
            expires_at: None,
            data_size_bytes: None,
            trace_id: None,
            span_id: None,
            tags: None,
        }
    }

    /// §3 invariant: `dataSizeBytes = |UTF-8 JSON(rawOutput)| + |UTF-8
    /// JSON(transformedOutput)|`.
    pub fn recompute_data_size(&mut self) {
        let raw_len = self.raw_output.as_ref().map(hashing::utf8_json_len).unwrap_or(0);
        let transformed_len = self.transformed_output.as_ref().map(hashing::utf8_json_len).unwrap_or(0);
        self.data_size_bytes = Some((raw_len + transformed_len) as u64);
    }

    /// §3 invariant: `cacheableAndValid() ⟺ cacheable ∧ (expiresAt is null ∨
    /// expiresAt > now)`.
    pub fn cacheable_and_valid(&self) -> bool {
        self.cacheable && self.expires_at.is_none_or(|exp| exp > Utc::now())
    }

    pub fn mark_terminal(&mut self, status: JobExecutionStatus) {
        self.status = status;
        let now = Utc::now();
        self.end_time = Some(now);
        self.duration_millis = Some((now - self.start_time).num_milliseconds());
    }
}

/// CRUD + time-based delete port backing the result store (§4.16, §6).
#[async_trait]
pub trait JobExecutionResultRepository: Send + Sync + std::fmt::Debug {
    async fn upsert(&self, result: JobExecutionResult) -> FireflyResult<()>;
    async fn find_by_execution_id(&self, execution_id: &str) -> FireflyResult<Option<JobExecutionResult>>;
    async fn delete_results_before(&self, ts: DateTime<Utc>) -> FireflyResult<u64>;
    async fn delete_expired_results(&self) -> FireflyResult<u64>;
}

/// Required-for-development default: one `DashMap` row per `executionId`.
#[derive(Debug, Default)]
pub struct InMemoryJobExecutionResultRepository {
    results: DashMap<String, JobExecutionResult>,
}

impl InMemoryJobExecutionResultRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[async_trait]
impl JobExecutionResultRepository for InMemoryJobExecutionResultRepository {
    async fn upsert(&self, result: JobExecutionResult) -> FireflyResult<()> {
        self.results.insert(result.execution_id.clone(), result);
        Ok(())
    }

    async fn find_by_execution_id(&self, execution_id: &str) -> FireflyResult<Option<JobExecutionResult>> {
        Ok(self.results.get(execution_id).map(|r| r.clone()))
    }

    async fn delete_results_before(&self, ts: DateTime<Utc>) -> FireflyResult<u64> {
        let before = self.results.len();
        self.results.retain(|_, r| r.start_time >= ts);
        Ok((before - self.results.len()) as u64)
    }

    async fn delete_expired_results(&self) -> FireflyResult<u64> {
        let before = self.results.len();
        let now = Utc::now();
        self.results.retain(|_, r| r.expires_at.is_none_or(|exp| exp > now));
        Ok((before - self.results.len()) as u64)
    }
}
