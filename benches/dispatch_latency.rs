//! Dispatch latency benchmark: smart-dispatch a single enrichment request
//! against a registry with one always-succeeding enricher, through the full
//! resiliency + cache + strategy-merge pipeline (§4.9/§4.11).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::{json, Value};
use tokio::runtime::Runtime;

use firefly_enrichment::dispatcher::{BatchSettings, SmartDispatcher};
use firefly_enrichment::enricher::Enricher;
use firefly_enrichment::model::{EnricherMetadata, EnrichmentRequest, MergeStrategy};
use firefly_enrichment::pipeline::{EnrichmentPipeline, PipelineSettings};
use firefly_enrichment::registry::EnricherRegistry;
use firefly_shared::audit::InMemoryJobAuditRepository;
use firefly_shared::cache::NoopCache;
use firefly_shared::error::{FireflyError, FireflyResult};
use firefly_shared::events::TracingEventPublisher;
use firefly_shared::observability::TracingBackedContext;
use firefly_shared::resilience::{ResiliencyConfig, ResiliencyDecorator};
use firefly_shared::TenantId;

#[derive(Debug)]
struct EchoEnricher {
    metadata: EnricherMetadata,
}

#[async_trait]
impl Enricher for EchoEnricher {
    fn metadata(&self) -> &EnricherMetadata {
        &self.metadata
    }

    async fn fetch_provider_data(&self, _request: &EnrichmentRequest) -> FireflyResult<Value> {
        Ok(json!({"score": 750}))
    }

    async fn map_to_target(&self, raw: &Value) -> FireflyResult<HashMap<String, Value>> {
        raw.as_object()
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .ok_or_else(|| FireflyError::validation("expected object"))
    }
}

fn dispatcher() -> SmartDispatcher {
    let metadata = EnricherMetadata::builder()
        .provider_name("acme")
        .r#type("credit-report")
        .priority(100)
        .tenant_id(TenantId::GLOBAL)
        .build();
    let registry = Arc::new(EnricherRegistry::new(vec![Arc::new(EchoEnricher { metadata })]).unwrap());
    let pipeline = Arc::new(EnrichmentPipeline {
        resiliency: Arc::new(ResiliencyDecorator::new(ResiliencyConfig::default())),
        tracing_ctx: Arc::new(TracingBackedContext),
        cache: Arc::new(NoopCache),
        audit: Arc::new(InMemoryJobAuditRepository::new()),
        events: Arc::new(TracingEventPublisher),
        lineage: Arc::new(firefly_enrichment::lineage::InMemoryLineageTracker::new()),
        cost: Arc::new(firefly_enrichment::cost::CostTracker::new()),
        settings: PipelineSettings::default(),
    });
    SmartDispatcher::new(registry, pipeline, BatchSettings::default())
}

fn request() -> EnrichmentRequest {
    EnrichmentRequest {
        r#type: "credit-report".to_string(),
        tenant_id: TenantId::GLOBAL,
        source_data: HashMap::from([("companyId".to_string(), json!("12345"))]),
        parameters: HashMap::new(),
        strategy: MergeStrategy::Enhance,
        request_id: None,
        correlation_id: None,
    }
}

fn bench_single_dispatch(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let dispatcher = dispatcher();
    c.bench_function("smart_dispatch_single", |b| {
        b.to_async(&runtime).iter_batched(
            request,
            |request| {
                let dispatcher = &dispatcher;
                async move { dispatcher.dispatch(&request).await.unwrap() }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_batch_dispatch(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let dispatcher = dispatcher();
    c.bench_function("smart_dispatch_batch_50", |b| {
        b.to_async(&runtime).iter_batched(
            || (0..50).map(|_| request()).collect::<Vec<_>>(),
            |requests| {
                let dispatcher = &dispatcher;
                async move { dispatcher.dispatch_batch(requests).await.unwrap() }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_single_dispatch, bench_batch_dispatch);
criterion_main!(benches);
