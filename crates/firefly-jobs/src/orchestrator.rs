//! # Job Orchestrator Port (§6)
//!
//! Concrete orchestrator adapters (Airflow, Step Functions, …) are an
//! explicit Non-goal — the core only consumes this port. No production
//! default ships; `InMemoryOrchestrator` below exists purely so the job
//! stage service has something to run against in this crate's own tests,
//! mirroring how `firefly-enrichment::enricher::tests::StubEnricher` stands
//! in for a real provider adapter.

use async_trait::async_trait;

use firefly_shared::error::FireflyResult;

use crate::model::{JobExecutionRequest, JobExecutionSnapshot, JobExecutionStatus, JobStatusSnapshot};

/// External workflow orchestrator the job stage service delegates to.
#[async_trait]
pub trait JobOrchestrator: Send + Sync + std::fmt::Debug {
    async fn start_job(&self, request: JobExecutionRequest) -> FireflyResult<String>;
    async fn check_job_status(&self, execution_id: &str) -> FireflyResult<JobStatusSnapshot>;
    async fn stop_job(&self, execution_id: &str, reason: Option<&str>) -> FireflyResult<()>;
    async fn get_job_execution(&self, execution_id: &str) -> FireflyResult<JobExecutionSnapshot>;
    fn orchestrator_type(&self) -> &str;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::Value;
    use uuid::Uuid;

    use firefly_shared::error::FireflyError;

    use super::*;

    /// Deterministic in-memory orchestrator: `start_job` assigns a fresh
    /// execution id and immediately marks the job `Succeeded` with a fixed
    /// `rawOutput`, so stage-service tests can exercise the full
    /// START→CHECK→COLLECT→RESULT→STOP chain without a real backend.
    #[derive(Debug, Default)]
    pub struct InMemoryOrchestrator {
        jobs: Mutex<HashMap<String, JobRecord>>,
        pub raw_output: Mutex<Option<Value>>,
    }

    #[derive(Debug, Clone)]
    struct JobRecord {
        status: JobExecutionStatus,
    }

    impl InMemoryOrchestrator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_raw_output(self, output: Value) -> Self {
            *self.raw_output.lock().expect("mutex poisoned") = Some(output);
            self
        }
    }

    #[async_trait]
    impl JobOrchestrator for InMemoryOrchestrator {
        async fn start_job(&self, _request: JobExecutionRequest) -> FireflyResult<String> {
            let execution_id = Uuid::new_v4().to_string();
            self.jobs.lock().expect("mutex poisoned").insert(
                execution_id.clone(),
                JobRecord {
                    status: JobExecutionStatus::Succeeded,
                },
            );
            Ok(execution_id)
        }

        async fn check_job_status(&self, execution_id: &str) -> FireflyResult<JobStatusSnapshot> {
            let jobs = self.jobs.lock().expect("mutex poisoned");
            let record = jobs
                .get(execution_id)
                .ok_or_else(|| FireflyError::not_found(format!("execution '{execution_id}' not found")))?;
            Ok(JobStatusSnapshot {
                status: record.status,
                progress_percentage: Some(100),
            })
        }

        async fn stop_job(&self, execution_id: &str, _reason: Option<&str>) -> FireflyResult<()> {
            let mut jobs = self.jobs.lock().expect("mutex poisoned");
            let record = jobs
                .get_mut(execution_id)
                .ok_or_else(|| FireflyError::not_found(format!("execution '{execution_id}' not found")))?;
            record.status = JobExecutionStatus::Aborted;
            Ok(())
        }

        async fn get_job_execution(&self, execution_id: &str) -> FireflyResult<JobExecutionSnapshot> {
            let jobs = self.jobs.lock().expect("mutex poisoned");
            let record = jobs
                .get(execution_id)
                .ok_or_else(|| FireflyError::not_found(format!("execution '{execution_id}' not found")))?;
            Ok(JobExecutionSnapshot {
                status: record.status,
                raw_output: self.raw_output.lock().expect("mutex poisoned").clone(),
            })
        }

        fn orchestrator_type(&self) -> &str {
            "in-memory"
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use firefly_shared::error::FireflyError;

    use super::test_support::InMemoryOrchestrator;
    use super::*;

    #[tokio::test]
    async fn start_then_check_reports_succeeded() {
        let orchestrator = InMemoryOrchestrator::new().with_raw_output(json!({"a": 1}));
        let id = orchestrator
            .start_job(JobExecutionRequest {
                job_definition: "customer-data-extraction".to_string(),
                input: HashMap::new(),
                request_id: None,
                initiator: None,
                metadata: None,
            })
            .await
            .unwrap();
        let status = orchestrator.check_job_status(&id).await.unwrap();
        assert_eq!(status.status, JobExecutionStatus::Succeeded);
    }

    #[tokio::test]
    async fn unknown_execution_id_is_not_found() {
        let orchestrator = InMemoryOrchestrator::new();
        let result = orchestrator.check_job_status("missing").await;
        assert!(matches!(result, Err(FireflyError::NotFound(_))));
    }

    #[tokio::test]
    async fn stop_job_marks_aborted() {
        let orchestrator = InMemoryOrchestrator::new();
        let id = orchestrator
            .start_job(JobExecutionRequest {
                job_definition: "job".to_string(),
                input: HashMap::new(),
                request_id: None,
                initiator: None,
                metadata: None,
            })
            .await
            .unwrap();
        orchestrator.stop_job(&id, Some("caller requested")).await.unwrap();
        let status = orchestrator.check_job_status(&id).await.unwrap();
        assert_eq!(status.status, JobExecutionStatus::Aborted);
    }
}
