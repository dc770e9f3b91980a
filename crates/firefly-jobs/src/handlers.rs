//! # Job HTTP-shaped handlers (§6)
//!
//! Plain async functions, one per row of §6's job-lifecycle table. No HTTP
//! framework dependency lives here, matching
//! `firefly_enrichment::handlers::EnrichmentHandlers`: a host wires these to
//! whatever router it uses.

use std::sync::Arc;

use firefly_shared::error::FireflyResult;

use crate::model::{JobStageRequest, JobStageResponse};
use crate::stage::{JobStageService, SyncJobStageService};

/// Composes the async and sync stage services behind the §6 job endpoints.
/// Construct once per process and share via `Arc`.
pub struct JobHandlers {
    pub stages: Arc<JobStageService>,
    pub sync: Arc<SyncJobStageService>,
}

impl JobHandlers {
    /// `POST /api/v1/jobs/start`.
    pub async fn start(&self, request: JobStageRequest) -> JobStageResponse {
        self.stages.execute_stage(&request).await
    }

    /// `GET /api/v1/jobs/{executionId}/check`.
    pub async fn check(&self, execution_id: &str) -> JobStageResponse {
        self.stages
            .execute_stage(&check_shaped_request(firefly_shared::JobStage::Check, execution_id))
            .await
    }

    /// `GET /api/v1/jobs/{executionId}/collect`.
    pub async fn collect(&self, execution_id: &str) -> JobStageResponse {
        self.stages
            .execute_stage(&check_shaped_request(firefly_shared::JobStage::Collect, execution_id))
            .await
    }

    /// `GET /api/v1/jobs/{executionId}/result?targetDtoClass=&mapperName=`.
    pub async fn result(&self, execution_id: &str, target_dto_class: &str, mapper_name: Option<&str>) -> JobStageResponse {
        let mut request = check_shaped_request(firefly_shared::JobStage::Result, execution_id);
        request.target_dto_class = Some(target_dto_class.to_string());
        request.mapper_name = mapper_name.map(|s| s.to_string());
        self.stages.execute_stage(&request).await
    }

    /// `POST /api/v1/jobs/{executionId}/stop`.
    pub async fn stop(&self, execution_id: &str, reason: Option<&str>) -> JobStageResponse {
        let mut request = check_shaped_request(firefly_shared::JobStage::Stop, execution_id);
        if let Some(reason) = reason {
            request.metadata = Some(serde_json::json!({ "reason": reason }));
        }
        self.stages.execute_stage(&request).await
    }

    /// `POST /api/v1/execute` — §4.14 sync (`ALL`) variant.
    pub async fn execute(&self, request: JobStageRequest) -> FireflyResult<JobStageResponse> {
        Ok(self.sync.execute(&request).await)
    }
}

fn check_shaped_request(stage: firefly_shared::JobStage, execution_id: &str) -> JobStageRequest {
    JobStageRequest {
        stage,
        job_type: None,
        parameters: None,
        execution_id: Some(execution_id.to_string()),
        request_id: None,
        initiator: None,
        metadata: None,
        target_dto_class: None,
        mapper_name: None,
    }
}
