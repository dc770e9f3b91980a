//! # Job Stage Service (§2.14, §4.14)
//!
//! `JobStageService` is the STAGE template: validate → resiliency+observe →
//! delegate to the orchestrator → audit/persist, for each of START, CHECK,
//! COLLECT, RESULT, STOP. Per §9's "replace inheritance with composition"
//! flag, this is a single struct with one method per stage rather than an
//! `AbstractResilientDataJobService` base class — the struct owns
//! resiliency, tracing, audit, and persistence, and dispatches to a
//! stage-specific handler internally.
//!
//! `SyncJobStageService` is the §4.14 "sync variant": a single business-logic
//! port invoked in-process with the same resiliency/audit envelope, no
//! orchestrator delegation, backing the `ALL` stage / `/api/v1/execute`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use firefly_shared::audit::{AuditEventType, JobAuditEntry, JobAuditRepository};
use firefly_shared::error::{FireflyError, FireflyResult};
use firefly_shared::events::{topics, EventPublisher};
use firefly_shared::observability::TracingContext;
use firefly_shared::resilience::ResiliencyDecorator;
use firefly_shared::JobStage;

use crate::mapper::MapperRegistry;
use crate::model::{
    JobExecutionRequest, JobExecutionStatus, JobStageRequest, JobStageResponse,
};
use crate::orchestrator::JobOrchestrator;
use crate::result::{JobExecutionResult, JobExecutionResultRepository};

/// Tunables read directly by the stage service (§6 `default-timeout-seconds`,
/// `publish-events`, `orchestration.persistence.*`).
#[derive(Debug, Clone)]
pub struct JobStageSettings {
    pub default_timeout: Duration,
    pub publish_events: bool,
    pub orchestrator_type: String,
}

impl Default for JobStageSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            publish_events: true,
            orchestrator_type: "default".to_string(),
        }
    }
}

/// §4.14: owns resiliency, tracing, audit, and persistence; delegates the
/// stage-specific business step to the orchestrator port.
pub struct JobStageService {
    pub orchestrator: Arc<dyn JobOrchestrator>,
    pub resiliency: Arc<ResiliencyDecorator>,
    pub tracing_ctx: Arc<dyn TracingContext>,
    pub audit: Arc<dyn JobAuditRepository>,
    pub results: Arc<dyn JobExecutionResultRepository>,
    pub events: Arc<dyn EventPublisher>,
    pub mappers: Arc<MapperRegistry>,
    pub settings: JobStageSettings,
}

impl JobStageService {
    /// §4.14 steps 1-6, run for whichever stage `request.stage` names.
    pub async fn execute_stage(&self, request: &JobStageRequest) -> JobStageResponse {
        if let Err(err) = request.validate() {
            return self.failure_response(request.stage, request.execution_id.clone(), &err);
        }

        let execution_id_for_audit = request.execution_id.clone().unwrap_or_default();
        self.append_audit(
            JobAuditEntry::new(request.stage, AuditEventType::OperationStarted)
                .with_execution_id(execution_id_for_audit.clone()),
        )
        .await;

        let span = self.tracing_ctx.start_span(&format!("job.stage.{}", request.stage), None);
        let started = Instant::now();

        let outcome = self
            .resiliency
            .call("job", request.stage.as_str(), || self.dispatch_stage(request))
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(response) => {
                self.append_audit(
                    JobAuditEntry::new(request.stage, AuditEventType::OperationCompleted)
                        .with_execution_id(response.execution_id.clone()),
                )
                .await;
                self.publish_for_stage(request.stage, &response).await;
                response
            }
            Err(err) => {
                self.append_audit(
                    JobAuditEntry::new(request.stage, AuditEventType::OperationFailed)
                        .with_execution_id(execution_id_for_audit.clone())
                        .with_error(err.to_string()),
                )
                .await;
                self.publish(topics::JOB_FAILED, serde_json::json!({"stage": request.stage.to_string(), "error": err.to_string()}))
                    .await;
                let _ = duration_ms;
                span.record_error(&err.to_string());
                self.failure_response(request.stage, request.execution_id.clone(), &err)
            }
        }
    }

    async fn dispatch_stage(&self, request: &JobStageRequest) -> FireflyResult<JobStageResponse> {
        match request.stage {
            JobStage::Start => self.handle_start(request).await,
            JobStage::Check => self.handle_check(request).await,
            JobStage::Collect => self.handle_collect(request).await,
            JobStage::Result => self.handle_result(request).await,
            JobStage::Stop => self.handle_stop(request).await,
            JobStage::All => Err(FireflyError::validation("ALL stage is served by the sync variant")),
        }
    }

    async fn handle_start(&self, request: &JobStageRequest) -> FireflyResult<JobStageResponse> {
        let job_type = request.job_type.clone().expect("validated by request.validate()");
        let parameters = request.parameters.clone().expect("validated by request.validate()");

        let execution_id = self
            .orchestrator
            .start_job(JobExecutionRequest {
                job_definition: job_type.clone(),
                input: parameters,
                request_id: request.request_id.clone(),
                initiator: request.initiator.clone(),
                metadata: request.metadata.clone(),
            })
            .await?;

        let result = JobExecutionResult::new_running(execution_id.clone(), job_type, request.request_id.clone());
        self.results.upsert(result).await?;

        Ok(JobStageResponse {
            stage: JobStage::Start,
            execution_id,
            status: JobExecutionStatus::Running,
            success: true,
            message: None,
            progress_percentage: Some(0),
            data: None,
            error: None,
            timestamp: chrono::Utc::now(),
            metadata: None,
        })
    }

    async fn handle_check(&self, request: &JobStageRequest) -> FireflyResult<JobStageResponse> {
        let execution_id = request.execution_id.clone().expect("validated by request.validate()");
        let snapshot = self.orchestrator.check_job_status(&execution_id).await?;

        if let Some(mut result) = self.results.find_by_execution_id(&execution_id).await? {
            result.status = snapshot.status;
            if snapshot.progress_percentage.is_some() {
                result.progress_percentage = snapshot.progress_percentage;
            }
            if snapshot.status.is_terminal() {
                result.mark_terminal(snapshot.status);
            }
            self.results.upsert(result).await?;
        }

        Ok(JobStageResponse {
            stage: JobStage::Check,
            execution_id,
            status: snapshot.status,
            success: snapshot.status.is_success(),
            message: None,
            progress_percentage: snapshot.progress_percentage,
            data: None,
            error: None,
            timestamp: chrono::Utc::now(),
            metadata: None,
        })
    }

    async fn handle_collect(&self, request: &JobStageRequest) -> FireflyResult<JobStageResponse> {
        let execution_id = request.execution_id.clone().expect("validated by request.validate()");
        let snapshot = self.orchestrator.get_job_execution(&execution_id).await?;

        let mut result = self
            .results
            .find_by_execution_id(&execution_id)
            .await?
            .unwrap_or_else(|| JobExecutionResult::new_running(execution_id.clone(), "unknown", request.request_id.clone()));
        result.status = snapshot.status;
        result.raw_output = snapshot.raw_output.clone();
        result.recompute_data_size();
        if snapshot.status.is_terminal() {
            result.mark_terminal(snapshot.status);
        }
        self.results.upsert(result).await?;

        Ok(JobStageResponse {
            stage: JobStage::Collect,
            execution_id,
            status: snapshot.status,
            success: snapshot.status.is_success(),
            message: None,
            progress_percentage: None,
            data: snapshot.raw_output,
            error: None,
            timestamp: chrono::Utc::now(),
            metadata: None,
        })
    }

    async fn handle_result(&self, request: &JobStageRequest) -> FireflyResult<JobStageResponse> {
        let execution_id = request.execution_id.clone().expect("validated by request.validate()");
        let target_dto_class = request.target_dto_class.clone().expect("validated by request.validate()");

        let mut result = match self.results.find_by_execution_id(&execution_id).await? {
            Some(result) if result.raw_output.is_some() => result,
            _ => {
                // §4.14 RESULT: "if rawOutput absent, first COLLECT".
                self.handle_collect(request).await?;
                self.results
                    .find_by_execution_id(&execution_id)
                    .await?
                    .ok_or_else(|| FireflyError::not_found(format!("execution '{execution_id}' not found")))?
            }
        };

        let raw_output = result
            .raw_output
            .clone()
            .ok_or_else(|| FireflyError::not_found(format!("execution '{execution_id}' has no collected output")))?;

        let mapper_key = request.mapper_name.as_deref().unwrap_or(&target_dto_class);
        let mapper = self
            .mappers
            .get_mapper(mapper_key)
            .ok_or_else(|| FireflyError::not_found(format!("no mapper registered for '{mapper_key}'")))?;

        let mapped = mapper.map_to_target(&raw_output)?;

        result.transformed_output = Some(mapped.clone());
        result.target_dto_class = Some(target_dto_class);
        result.mapper_name = request.mapper_name.clone();
        result.recompute_data_size();
        let status = result.status;
        self.results.upsert(result).await?;

        Ok(JobStageResponse {
            stage: JobStage::Result,
            execution_id,
            status,
            success: status.is_success(),
            message: None,
            progress_percentage: None,
            data: Some(serde_json::json!({ "result": mapped })),
            error: None,
            timestamp: chrono::Utc::now(),
            metadata: None,
        })
    }

    async fn handle_stop(&self, request: &JobStageRequest) -> FireflyResult<JobStageResponse> {
        let execution_id = request.execution_id.clone().expect("validated by request.validate()");
        let reason = request
            .metadata
            .as_ref()
            .and_then(|m| m.get("reason"))
            .and_then(|v| v.as_str());
        self.orchestrator.stop_job(&execution_id, reason).await?;

        if let Some(mut result) = self.results.find_by_execution_id(&execution_id).await? {
            result.mark_terminal(JobExecutionStatus::Aborted);
            self.results.upsert(result).await?;
        }

        Ok(JobStageResponse {
            stage: JobStage::Stop,
            execution_id,
            status: JobExecutionStatus::Aborted,
            success: true,
            message: reason.map(|r| r.to_string()),
            progress_percentage: None,
            data: None,
            error: None,
            timestamp: chrono::Utc::now(),
            metadata: None,
        })
    }

    /// §4.14 step 6: translate a kind to a status unless it more
    /// specifically maps to `TIMED_OUT` (§7 "JobStageResponse failures set
    /// status=FAILED unless the underlying kind maps to TIMED_OUT or
    /// ABORTED").
    fn failure_response(&self, stage: JobStage, execution_id: Option<String>, err: &FireflyError) -> JobStageResponse {
        let status = match err {
            FireflyError::Timeout(_) => JobExecutionStatus::TimedOut,
            _ => JobExecutionStatus::Failed,
        };
        JobStageResponse::failure(stage, execution_id.unwrap_or_default(), status, err.to_string())
    }

    async fn append_audit(&self, entry: JobAuditEntry) {
        if let Err(err) = self.audit.append(entry).await {
            tracing::warn!(error = %err, "audit append failed");
        }
    }

    async fn publish(&self, topic: &str, payload: Value) {
        if !self.settings.publish_events {
            return;
        }
        if let Err(err) = self.events.publish(topic, payload).await {
            tracing::warn!(error = %err, topic, "event publish failed");
        }
    }

    async fn publish_for_stage(&self, stage: JobStage, response: &JobStageResponse) {
        let topic = match stage {
            JobStage::Start => topics::JOB_STARTED,
            JobStage::Check => topics::JOB_CHECKED,
            JobStage::Collect => topics::JOB_COLLECTED,
            JobStage::Result => topics::JOB_RESULT,
            JobStage::Stop => topics::JOB_STOPPED,
            JobStage::All => return,
        };
        self.publish(
            topic,
            serde_json::json!({"executionId": response.execution_id, "status": response.status.to_string()}),
        )
        .await;
    }
}

/// §4.14 sync variant's business-logic seam: runs entirely in-process, no
/// orchestrator delegation.
#[async_trait]
pub trait SyncJobHandler: Send + Sync + std::fmt::Debug {
    async fn handle(&self, parameters: &HashMap<String, Value>) -> FireflyResult<Value>;
}

/// Single-stage (`ALL`) synchronous execution: same resiliency/audit
/// envelope as [`JobStageService`], no orchestrator, total budget bounded by
/// `default-timeout-seconds` (§4.14).
pub struct SyncJobStageService {
    pub handler: Arc<dyn SyncJobHandler>,
    pub resiliency: Arc<ResiliencyDecorator>,
    pub tracing_ctx: Arc<dyn TracingContext>,
    pub audit: Arc<dyn JobAuditRepository>,
    pub events: Arc<dyn EventPublisher>,
    pub settings: JobStageSettings,
}

impl SyncJobStageService {
    pub async fn execute(&self, request: &JobStageRequest) -> JobStageResponse {
        let parameters = request.parameters.clone().unwrap_or_default();
        let execution_id = request
            .execution_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        self.append_audit(
            JobAuditEntry::new(JobStage::All, AuditEventType::OperationStarted).with_execution_id(execution_id.clone()),
        )
        .await;

        let span = self.tracing_ctx.start_span("job.stage.ALL", None);
        let handler = self.handler.clone();
        let outcome = self
            .resiliency
            .call("job", "_sync", move || {
                let handler = handler.clone();
                let parameters = parameters.clone();
                async move { handler.handle(&parameters).await }
            })
            .await;

        match outcome {
            Ok(data) => {
                self.append_audit(
                    JobAuditEntry::new(JobStage::All, AuditEventType::OperationCompleted)
                        .with_execution_id(execution_id.clone()),
                )
                .await;
                self.publish(topics::JOB_RESULT, serde_json::json!({"executionId": execution_id})).await;
                JobStageResponse {
                    stage: JobStage::All,
                    execution_id,
                    status: JobExecutionStatus::Succeeded,
                    success: true,
                    message: None,
                    progress_percentage: Some(100),
                    data: Some(data),
                    error: None,
                    timestamp: chrono::Utc::now(),
                    metadata: None,
                }
            }
            Err(err) => {
                self.append_audit(
                    JobAuditEntry::new(JobStage::All, AuditEventType::OperationFailed)
                        .with_execution_id(execution_id.clone())
                        .with_error(err.to_string()),
                )
                .await;
                self.publish(topics::JOB_FAILED, serde_json::json!({"executionId": execution_id, "error": err.to_string()}))
                    .await;
                span.record_error(&err.to_string());
                let status = match &err {
                    FireflyError::Timeout(_) => JobExecutionStatus::TimedOut,
                    _ => JobExecutionStatus::Failed,
                };
                JobStageResponse::failure(JobStage::All, execution_id, status, err.to_string())
            }
        }
    }

    async fn append_audit(&self, entry: JobAuditEntry) {
        if let Err(err) = self.audit.append(entry).await {
            tracing::warn!(error = %err, "audit append failed");
        }
    }

    async fn publish(&self, topic: &str, payload: Value) {
        if !self.settings.publish_events {
            return;
        }
        if let Err(err) = self.events.publish(topic, payload).await {
            tracing::warn!(error = %err, topic, "event publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::FieldRenameMapper;
    use crate::orchestrator::test_support::InMemoryOrchestrator;
    use firefly_shared::audit::InMemoryJobAuditRepository;
    use firefly_shared::events::RecordingEventPublisher;
    use firefly_shared::observability::TracingBackedContext;
    use firefly_shared::resilience::ResiliencyConfig;
    use serde_json::json;

    fn service(orchestrator: Arc<dyn JobOrchestrator>, mappers: MapperRegistry) -> JobStageService {
        JobStageService {
            orchestrator,
            resiliency: Arc::new(ResiliencyDecorator::new(ResiliencyConfig::default())),
            tracing_ctx: Arc::new(TracingBackedContext::default()),
            audit: Arc::new(InMemoryJobAuditRepository::new()),
            results: Arc::new(crate::result::InMemoryJobExecutionResultRepository::new()),
            events: Arc::new(RecordingEventPublisher::new()),
            mappers: Arc::new(mappers),
            settings: JobStageSettings::default(),
        }
    }

    fn start_request() -> JobStageRequest {
        JobStageRequest {
            stage: JobStage::Start,
            job_type: Some("customer-data-extraction".to_string()),
            parameters: Some(HashMap::from([("customerId".to_string(), json!("12345"))])),
            execution_id: None,
            request_id: None,
            initiator: None,
            metadata: None,
            target_dto_class: None,
            mapper_name: None,
        }
    }

    /// §8 S6 — async job lifecycle, full START→CHECK→COLLECT→RESULT chain.
    #[tokio::test]
    async fn s6_async_job_lifecycle() {
        let raw = json!({
            "customer_id": "12345",
            "first_name": "John",
            "last_name": "Doe",
            "email_address": "john@example.com",
        });
        let orchestrator: Arc<dyn JobOrchestrator> =
            Arc::new(InMemoryOrchestrator::new().with_raw_output(raw));
        let mut mappers = MapperRegistry::new();
        mappers
            .register(
                "Customer",
                Arc::new(FieldRenameMapper::new(HashMap::from([
                    ("customer_id".to_string(), "customerId".to_string()),
                    ("first_name".to_string(), "firstName".to_string()),
                    ("last_name".to_string(), "lastName".to_string()),
                    ("email_address".to_string(), "email".to_string()),
                ]))),
            )
            .unwrap();
        let service = service(orchestrator, mappers);

        let start = service.execute_stage(&start_request()).await;
        assert_eq!(start.stage, JobStage::Start);
        assert_eq!(start.status, JobExecutionStatus::Running);
        assert!(start.success);
        let execution_id = start.execution_id;

        let check_request = JobStageRequest {
            stage: JobStage::Check,
            execution_id: Some(execution_id.clone()),
            ..start_request()
        };
        let check = service.execute_stage(&check_request).await;
        assert_eq!(check.status, JobExecutionStatus::Succeeded);
        assert!(check.success);

        let collect_request = JobStageRequest {
            stage: JobStage::Collect,
            execution_id: Some(execution_id.clone()),
            ..start_request()
        };
        let collect = service.execute_stage(&collect_request).await;
        assert_eq!(collect.data.unwrap()["customer_id"], json!("12345"));

        let result_request = JobStageRequest {
            stage: JobStage::Result,
            execution_id: Some(execution_id.clone()),
            target_dto_class: Some("Customer".to_string()),
            ..start_request()
        };
        let result = service.execute_stage(&result_request).await;
        assert!(result.success);
        assert_eq!(
            result.data.unwrap(),
            json!({
                "result": {
                    "customerId": "12345",
                    "firstName": "John",
                    "lastName": "Doe",
                    "email": "john@example.com",
                }
            })
        );
    }

    #[tokio::test]
    async fn stop_marks_execution_aborted() {
        let orchestrator: Arc<dyn JobOrchestrator> = Arc::new(InMemoryOrchestrator::new());
        let service = service(orchestrator, MapperRegistry::new());
        let start = service.execute_stage(&start_request()).await;

        let stop_request = JobStageRequest {
            stage: JobStage::Stop,
            execution_id: Some(start.execution_id),
            ..start_request()
        };
        let stop = service.execute_stage(&stop_request).await;
        assert_eq!(stop.status, JobExecutionStatus::Aborted);
        assert!(stop.success);
    }

    #[tokio::test]
    async fn invalid_request_fails_before_touching_the_orchestrator() {
        let orchestrator: Arc<dyn JobOrchestrator> = Arc::new(InMemoryOrchestrator::new());
        let service = service(orchestrator, MapperRegistry::new());
        let bad_request = JobStageRequest {
            stage: JobStage::Check,
            job_type: None,
            parameters: None,
            execution_id: None,
            request_id: None,
            initiator: None,
            metadata: None,
            target_dto_class: None,
            mapper_name: None,
        };
        let response = service.execute_stage(&bad_request).await;
        assert!(!response.success);
        assert_eq!(response.status, JobExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn result_without_registered_mapper_fails() {
        let orchestrator: Arc<dyn JobOrchestrator> =
            Arc::new(InMemoryOrchestrator::new().with_raw_output(json!({"a": 1})));
        let service = service(orchestrator, MapperRegistry::new());
        let start = service.execute_stage(&start_request()).await;

        let result_request = JobStageRequest {
            stage: JobStage::Result,
            execution_id: Some(start.execution_id),
            target_dto_class: Some("Unregistered".to_string()),
            ..start_request()
        };
        let result = service.execute_stage(&result_request).await;
        assert!(!result.success);
    }

    #[derive(Debug)]
    struct EchoHandler;

    #[async_trait]
    impl SyncJobHandler for EchoHandler {
        async fn handle(&self, parameters: &HashMap<String, Value>) -> FireflyResult<Value> {
            Ok(serde_json::to_value(parameters)?)
        }
    }

    #[tokio::test]
    async fn sync_execute_runs_in_process_without_an_orchestrator() {
        let service = SyncJobStageService {
            handler: Arc::new(EchoHandler),
            resiliency: Arc::new(ResiliencyDecorator::new(ResiliencyConfig::default())),
            tracing_ctx: Arc::new(TracingBackedContext::default()),
            audit: Arc::new(InMemoryJobAuditRepository::new()),
            events: Arc::new(RecordingEventPublisher::new()),
            settings: JobStageSettings::default(),
        };
        let request = JobStageRequest {
            stage: JobStage::All,
            job_type: None,
            parameters: Some(HashMap::from([("x".to_string(), json!(1))])),
            execution_id: None,
            request_id: None,
            initiator: None,
            metadata: None,
            target_dto_class: None,
            mapper_name: None,
        };
        let response = service.execute(&request).await;
        assert!(response.success);
        assert_eq!(response.data.unwrap()["x"], json!(1));
    }
}
