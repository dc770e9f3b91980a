//! # firefly-jobs
//!
//! Staged asynchronous job lifecycle (§2.14-§2.16): START/CHECK/COLLECT/
//! RESULT/STOP against an external workflow orchestrator, plus the
//! synchronous `ALL` variant. Built around the [`orchestrator::JobOrchestrator`]
//! seam — concrete orchestrator adapters are an explicit Non-goal — and
//! [`stage::JobStageService`], which composes resiliency, observability,
//! audit, and persistence around it the same way
//! `firefly_enrichment::pipeline::EnrichmentPipeline` does for enrichment.

pub mod handlers;
pub mod mapper;
pub mod model;
pub mod orchestrator;
pub mod result;
pub mod stage;

pub use handlers::JobHandlers;
pub use mapper::{Mapper, MapperRegistry};
pub use model::{
    JobExecutionRequest, JobExecutionSnapshot, JobExecutionStatus, JobStageRequest, JobStageResponse,
    JobStatusSnapshot,
};
pub use orchestrator::JobOrchestrator;
pub use result::{JobExecutionResult, JobExecutionResultRepository};
pub use stage::{JobStageService, JobStageSettings, SyncJobHandler, SyncJobStageService};
