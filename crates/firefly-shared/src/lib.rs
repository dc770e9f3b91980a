//! Cross-cutting infrastructure shared by the enrichment and job-lifecycle
//! cores: error taxonomy, tenant identity, configuration, resiliency,
//! observability, caching, audit trail, and event publishing.

pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod hashing;
pub mod jobstage;
pub mod observability;
pub mod resilience;
pub mod tenant;

pub use error::{FailureKind, FireflyError, FireflyResult};
pub use jobstage::JobStage;
pub use tenant::TenantId;
