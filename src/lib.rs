//! # firefly-data-core
//!
//! Thin facade over the three workspace crates: [`firefly_shared`] (cross-
//! cutting infrastructure), [`firefly_enrichment`] (the registry-backed
//! enrichment dispatcher), and [`firefly_jobs`] (the staged job lifecycle).
//! This crate carries no business logic of its own — [`FireflyDataCore`] is
//! a convenience composition root a host can use to wire the two cores
//! from one [`firefly_shared::config::CoreConfig`] without re-deriving the
//! wiring the hosts in this repo's own workspace-level tests already do by
//! hand.

pub use firefly_enrichment;
pub use firefly_jobs;
pub use firefly_shared;

use std::sync::Arc;
use std::time::Duration;

use firefly_enrichment::dispatcher::BatchSettings;
use firefly_enrichment::discovery::DiscoveryService;
use firefly_enrichment::enricher::Enricher;
use firefly_enrichment::handlers::EnrichmentHandlers;
use firefly_enrichment::operations::OperationDispatcher;
use firefly_enrichment::pipeline::{EnrichmentPipeline, PipelineSettings};
use firefly_enrichment::registry::EnricherRegistry;
use firefly_enrichment::SmartDispatcher;
use firefly_jobs::handlers::JobHandlers;
use firefly_jobs::stage::{JobStageService, JobStageSettings, SyncJobHandler, SyncJobStageService};
use firefly_jobs::{JobOrchestrator, MapperRegistry};
use firefly_shared::audit::{InMemoryJobAuditRepository, JobAuditRepository};
use firefly_shared::cache::{CacheAdapter, MokaCacheAdapter, NoopCache};
use firefly_shared::config::CoreConfig;
use firefly_shared::error::FireflyResult;
use firefly_shared::events::{EventPublisher, TracingEventPublisher};
use firefly_shared::observability::{TracingBackedContext, TracingContext};
use firefly_shared::resilience::ResiliencyDecorator;

/// Everything a host needs to serve the §6 enrichment and job-lifecycle
/// endpoints, wired from one [`CoreConfig`] plus the caller-supplied
/// enrichers, orchestrator, and mappers.
pub struct FireflyDataCore {
    pub enrichment: Arc<EnrichmentHandlers>,
    pub jobs: Arc<JobHandlers>,
}

/// Ports the host must supply; everything else is built from defaults
/// matching the required-for-development adapters named throughout §4.
pub struct FireflyDataCoreDeps {
    pub enrichers: Vec<Arc<dyn Enricher>>,
    pub orchestrator: Arc<dyn JobOrchestrator>,
    pub mappers: MapperRegistry,
    pub sync_job_handler: Arc<dyn SyncJobHandler>,
    pub audit: Option<Arc<dyn JobAuditRepository>>,
    pub events: Option<Arc<dyn EventPublisher>>,
    pub tracing_ctx: Option<Arc<dyn TracingContext>>,
}

impl FireflyDataCore {
    /// Build the full handler surface from `config` and `deps`. Uses an
    /// in-process `moka` cache when `enrichment.cache-enabled` is set,
    /// `NoopCache` otherwise (§4.3's "absence of caching ≡ disabled").
    pub fn build(config: &CoreConfig, deps: FireflyDataCoreDeps) -> FireflyResult<Self> {
        let tracing_ctx = deps
            .tracing_ctx
            .unwrap_or_else(|| Arc::new(TracingBackedContext));
        let audit = deps.audit.unwrap_or_else(|| Arc::new(InMemoryJobAuditRepository::new()));
        let events = deps.events.unwrap_or_else(|| Arc::new(TracingEventPublisher));

        let enrichment_resiliency = Arc::new(ResiliencyDecorator::new(
            config
                .resiliency
                .to_runtime_config(config.enrichment.default_timeout()),
        ));

        let cache: Arc<dyn CacheAdapter> = if config.enrichment.cache_enabled {
            Arc::new(MokaCacheAdapter::new(10_000, config.enrichment.cache_ttl()))
        } else {
            Arc::new(NoopCache)
        };

        let registry = Arc::new(EnricherRegistry::new(deps.enrichers)?);
        let pipeline = Arc::new(EnrichmentPipeline {
            resiliency: enrichment_resiliency.clone(),
            tracing_ctx: tracing_ctx.clone(),
            cache,
            audit: audit.clone(),
            events: events.clone(),
            lineage: Arc::new(firefly_enrichment::lineage::InMemoryLineageTracker::new()),
            cost: Arc::new(firefly_enrichment::cost::CostTracker::new()),
            settings: PipelineSettings {
                cache_enabled: config.enrichment.cache_enabled,
                cache_ttl: config.enrichment.cache_ttl(),
                lineage_enabled: config.lineage.enabled,
                publish_events: config.enrichment.publish_events,
            },
        });
        let dispatcher = Arc::new(SmartDispatcher::new(
            registry.clone(),
            pipeline.clone(),
            BatchSettings {
                max_batch_size: config.enrichment.max_batch_size,
                batch_parallelism: config.enrichment.batch_parallelism,
                batch_fail_fast: config.enrichment.batch_fail_fast,
            },
        ));
        let operations_resiliency = Arc::new(ResiliencyDecorator::new(
            config
                .resiliency
                .to_runtime_config(config.operations.default_timeout()),
        ));
        let operations = Arc::new(OperationDispatcher::new(
            registry.clone(),
            operations_resiliency,
            tracing_ctx.clone(),
        ));
        let discovery = Arc::new(DiscoveryService::new(
            registry,
            pipeline.cost.clone(),
            Duration::from_secs(5),
        ));
        let enrichment = Arc::new(EnrichmentHandlers {
            dispatcher,
            operations,
            discovery,
        });

        let jobs_resiliency = Arc::new(ResiliencyDecorator::new(
            config
                .resiliency
                .to_runtime_config(config.operations.default_timeout()),
        ));
        let stages = Arc::new(JobStageService {
            orchestrator: deps.orchestrator,
            resiliency: jobs_resiliency.clone(),
            tracing_ctx: tracing_ctx.clone(),
            audit: audit.clone(),
            results: Arc::new(firefly_jobs::result::InMemoryJobExecutionResultRepository::new()),
            events: events.clone(),
            mappers: Arc::new(deps.mappers),
            settings: JobStageSettings {
                default_timeout: config.operations.default_timeout(),
                publish_events: config.operations.publish_events,
                orchestrator_type: "configured".to_string(),
            },
        });
        let sync = Arc::new(SyncJobStageService {
            handler: deps.sync_job_handler,
            resiliency: jobs_resiliency,
            tracing_ctx,
            audit,
            events,
            settings: JobStageSettings {
                default_timeout: config.enrichment.default_timeout(),
                publish_events: config.operations.publish_events,
                orchestrator_type: "sync".to_string(),
            },
        });
        let jobs = Arc::new(JobHandlers { stages, sync });

        Ok(Self { enrichment, jobs })
    }
}
