//! # Job Lifecycle Data Model (§3)
//!
//! `JobStage` lives in `firefly_shared::jobstage` since the audit trail
//! needs it too; everything else specific to the staged job lifecycle
//! (`JobExecutionStatus`, `JobStageRequest`, `JobStageResponse`, and the
//! `JobExecutionRequest` handed to the orchestrator port) lives here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use firefly_shared::error::{FireflyError, FireflyResult};
use firefly_shared::JobStage;

/// Terminal/in-flight status of a job execution (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobExecutionStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
    /// The sole terminal status for manual stops (§9 Open Question #1 —
    /// `STOPPED` is never produced; stops normalize to `Aborted`).
    Aborted,
}

impl JobExecutionStatus {
    /// §4.14 step 5: "success = status ∈ {RUNNING, SUCCEEDED, ABORTED}".
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            JobExecutionStatus::Running | JobExecutionStatus::Succeeded | JobExecutionStatus::Aborted
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobExecutionStatus::Running)
    }
}

impl std::fmt::Display for JobExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobExecutionStatus::Running => "RUNNING",
            JobExecutionStatus::Succeeded => "SUCCEEDED",
            JobExecutionStatus::Failed => "FAILED",
            JobExecutionStatus::TimedOut => "TIMED_OUT",
            JobExecutionStatus::Aborted => "ABORTED",
        };
        write!(f, "{s}")
    }
}

/// Caller-submitted request for one stage of the job lifecycle (§3
/// `JobStageRequest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStageRequest {
    pub stage: JobStage,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub parameters: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub initiator: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub target_dto_class: Option<String>,
    #[serde(default)]
    pub mapper_name: Option<String>,
}

impl JobStageRequest {
    /// §3 invariants: START requires `jobType`/`parameters`;
    /// CHECK/COLLECT/RESULT/STOP require `executionId`; RESULT requires
    /// `targetDtoClass`.
    pub fn validate(&self) -> FireflyResult<()> {
        if self.stage == JobStage::Start {
            if self.job_type.as_deref().unwrap_or_default().trim().is_empty() {
                return Err(FireflyError::validation("START requires jobType"));
            }
            if self.parameters.is_none() {
                return Err(FireflyError::validation("START requires parameters"));
            }
        }
        if self.stage.requires_execution_id()
            && self.execution_id.as_deref().unwrap_or_default().trim().is_empty()
        {
            return Err(FireflyError::validation(format!(
                "{} requires executionId",
                self.stage
            )));
        }
        if self.stage == JobStage::Result
            && self.target_dto_class.as_deref().unwrap_or_default().trim().is_empty()
        {
            return Err(FireflyError::validation("RESULT requires targetDtoClass"));
        }
        Ok(())
    }
}

/// Response returned for one stage of the job lifecycle (§3
/// `JobStageResponse`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStageResponse {
    pub stage: JobStage,
    pub execution_id: String,
    pub status: JobExecutionStatus,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub progress_percentage: Option<u8>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl JobStageResponse {
    pub fn failure(stage: JobStage, execution_id: impl Into<String>, status: JobExecutionStatus, error: impl Into<String>) -> Self {
        Self {
            stage,
            execution_id: execution_id.into(),
            status,
            success: false,
            message: None,
            progress_percentage: None,
            data: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
            metadata: None,
        }
    }
}

/// Input to `JobOrchestrator::start_job` (§6 port signature).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionRequest {
    pub job_definition: String,
    pub input: HashMap<String, Value>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub initiator: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Snapshot returned by `JobOrchestrator::check_job_status`.
#[derive(Debug, Clone)]
pub struct JobStatusSnapshot {
    pub status: JobExecutionStatus,
    pub progress_percentage: Option<u8>,
}

/// Snapshot returned by `JobOrchestrator::get_job_execution`.
#[derive(Debug, Clone)]
pub struct JobExecutionSnapshot {
    pub status: JobExecutionStatus,
    pub raw_output: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_requires_job_type_and_parameters() {
        let req = JobStageRequest {
            stage: JobStage::Start,
            job_type: None,
            parameters: None,
            execution_id: None,
            request_id: None,
            initiator: None,
            metadata: None,
            target_dto_class: None,
            mapper_name: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn check_requires_execution_id() {
        let req = JobStageRequest {
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
        assert!(req.validate().is_err());
    }

    #[test]
    fn result_requires_target_dto_class() {
        let req = JobStageRequest {
            stage: JobStage::Result,
            job_type: None,
            parameters: None,
            execution_id: Some("e-1".to_string()),
            request_id: None,
            initiator: None,
            metadata: None,
            target_dto_class: None,
            mapper_name: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn well_formed_start_request_validates() {
        let req = JobStageRequest {
            stage: JobStage::Start,
            job_type: Some("customer-data-extraction".to_string()),
            parameters: Some(HashMap::from([("customerId".to_string(), serde_json::json!("12345"))])),
            execution_id: None,
            request_id: None,
            initiator: None,
            metadata: None,
            target_dto_class: None,
            mapper_name: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn success_set_matches_spec() {
        assert!(JobExecutionStatus::Running.is_success());
        assert!(JobExecutionStatus::Succeeded.is_success());
        assert!(JobExecutionStatus::Aborted.is_success());
        assert!(!JobExecutionStatus::Failed.is_success());
        assert!(!JobExecutionStatus::TimedOut.is_success());
    }

    #[test]
    fn status_displays_as_upper_snake_case() {
        assert_eq!(JobExecutionStatus::TimedOut.to_string(), "TIMED_OUT");
        assert_eq!(JobExecutionStatus::Aborted.to_string(), "ABORTED");
    }
}
