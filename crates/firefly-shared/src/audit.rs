//! # Audit Trail (§3, §4.16)
//!
//! `JobAuditEntry` is an append-only record emitted at each stage of the
//! enrichment and job-lifecycle pipelines. `JobAuditRepository` is the
//! port; `InMemoryJobAuditRepository` is the required-for-development
//! default, modeled on the DTO + in-memory-store style used for the
//! orchestration layer's own result/status repositories.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::FireflyResult;
use crate::jobstage::JobStage;

/// Kind of audit event recorded against an execution or enrichment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    OperationStarted,
    OperationCompleted,
    OperationFailed,
    OperationRetried,
    CircuitBreakerOpened,
    CircuitBreakerClosed,
    RateLimitExceeded,
    StatusChanged,
    Custom,
}

/// Append-only audit record (§3 `JobAuditEntry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAuditEntry {
    pub audit_id: Uuid,
    pub execution_id: Option<String>,
    pub request_id: Option<String>,
    pub stage: JobStage,
    pub event_type: AuditEventType,
    pub status: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub initiator: Option<String>,
    pub job_type: Option<String>,
    pub input_parameters: Option<Value>,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub error_stack_trace: Option<String>,
    pub duration_ms: Option<u64>,
    pub orchestrator_type: Option<String>,
    pub metadata: Option<Value>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub resiliency_applied: Option<bool>,
    pub retry_attempts: Option<u32>,
}

impl JobAuditEntry {
    /// Start a minimal entry for `stage`/`event_type`; builder-style setters
    /// fill in the rest at call sites that have more context.
    pub fn new(stage: JobStage, event_type: AuditEventType) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            execution_id: None,
            request_id: None,
            stage,
            event_type,
            status: None,
            timestamp: Utc::now(),
            initiator: None,
            job_type: None,
            input_parameters: None,
            output_data: None,
            error_message: None,
            error_stack_trace: None,
            duration_ms: None,
            orchestrator_type: None,
            metadata: None,
            trace_id: None,
            span_id: None,
            resiliency_applied: None,
            retry_attempts: None,
        }
    }

    pub fn with_execution_id(mut self, id: impl Into<String>) -> Self {
        self.execution_id = Some(id.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Append/upsert-by-executionId port for the audit trail (§4.16).
#[async_trait]
pub trait JobAuditRepository: Send + Sync + std::fmt::Debug {
    async fn append(&self, entry: JobAuditEntry) -> FireflyResult<()>;
    async fn find_by_execution_id(&self, execution_id: &str) -> FireflyResult<Vec<JobAuditEntry>>;
    async fn delete_audit_before(&self, ts: DateTime<Utc>) -> FireflyResult<u64>;
}

/// In-memory default, required for development per §4.16. Entries are
/// appended to a single `RwLock<Vec<_>>`; a secondary `DashMap` index keyed
/// by `executionId` would add write-path complexity without changing the
/// observable contract, so lookups filter the log directly.
#[derive(Debug, Default)]
pub struct InMemoryJobAuditRepository {
    entries: RwLock<Vec<JobAuditEntry>>,
    by_execution: DashMap<String, usize>,
}

impl InMemoryJobAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("audit log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobAuditRepository for InMemoryJobAuditRepository {
    async fn append(&self, entry: JobAuditEntry) -> FireflyResult<()> {
        let mut entries = self.entries.write().expect("audit log lock poisoned");
        if let Some(execution_id) = entry.execution_id.clone() {
            self.by_execution
                .entry(execution_id)
                .and_modify(|count| *count += 1)
                .or_insert(1);
        }
        entries.push(entry);
        Ok(())
    }

    async fn find_by_execution_id(&self, execution_id: &str) -> FireflyResult<Vec<JobAuditEntry>> {
        let entries = self.entries.read().expect("audit log lock poisoned");
        Ok(entries
            .iter()
            .filter(|e| e.execution_id.as_deref() == Some(execution_id))
            .cloned()
            .collect())
    }

    async fn delete_audit_before(&self, ts: DateTime<Utc>) -> FireflyResult<u64> {
        let mut entries = self.entries.write().expect("audit log lock poisoned");
        let before = entries.len();
        entries.retain(|e| e.timestamp >= ts);
        Ok((before - entries.len()) as u64)
    }
}
