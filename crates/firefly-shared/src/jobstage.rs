//! # Job Stage (§3)
//!
//! Shared between the audit trail (`firefly-shared::audit`) and the job
//! stage service (`firefly-jobs`), so it lives in the cross-cutting crate
//! rather than being duplicated or introducing a shared-crate dependency
//! edge the wrong way.

use serde::{Deserialize, Serialize};

/// One stage of the asynchronous job lifecycle, or `All` for the
/// synchronous single-call variant (§4.14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStage {
    Start,
    Check,
    Collect,
    Result,
    Stop,
    All,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Start => "START",
            JobStage::Check => "CHECK",
            JobStage::Collect => "COLLECT",
            JobStage::Result => "RESULT",
            JobStage::Stop => "STOP",
            JobStage::All => "ALL",
        }
    }

    /// Whether this stage requires an `executionId` on the incoming
    /// request (§3 `JobStageRequest` invariants).
    pub fn requires_execution_id(&self) -> bool {
        matches!(
            self,
            JobStage::Check | JobStage::Collect | JobStage::Result | JobStage::Stop
        )
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
