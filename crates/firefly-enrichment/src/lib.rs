//! # firefly-enrichment
//!
//! Registry-backed, tenant-aware enrichment dispatcher (§2.8-§2.13). Built
//! around the [`enricher::Enricher`] seam: provider adapters implement
//! fetch/map, and everything else — resiliency, caching, strategy merge,
//! fallback, lineage, cost, observability — is composed around them by
//! [`pipeline::EnrichmentPipeline`] and [`dispatcher::SmartDispatcher`].

pub mod cost;
pub mod discovery;
pub mod dispatcher;
pub mod enricher;
pub mod fallback;
pub mod handlers;
pub mod lineage;
pub mod model;
pub mod operations;
pub mod pipeline;
pub mod quality;
pub mod registry;
pub mod strategy;
pub mod transform;

pub use dispatcher::{BatchSettings, SmartDispatcher};
pub use enricher::Enricher;
pub use handlers::EnrichmentHandlers;
pub use model::{EnrichmentRequest, EnrichmentResponse, EnricherMetadata, FallbackSpec, FallbackTrigger, MergeStrategy};
pub use pipeline::{EnrichmentPipeline, PipelineSettings};
pub use registry::EnricherRegistry;
