//! # Smart Dispatcher (§2.11, §4.11)
//!
//! Single dispatch resolves an enricher by `(type, tenantId, priority)` with
//! tenant-fallback and delegates to [`crate::pipeline::EnrichmentPipeline`].
//! Batch dispatch groups by `(type, tenantId)`, bounds per-group parallelism,
//! and preserves input order in the returned array regardless of completion
//! order (§5 "responses are emitted in input order").

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use firefly_shared::error::{FireflyError, FireflyResult};

use crate::fallback::FallbackChainExecutor;
use crate::model::{EnrichmentRequest, EnrichmentResponse};
use crate::pipeline::EnrichmentPipeline;
use crate::registry::EnricherRegistry;

/// Caller-tunable batch limits (§6 config: `max-batch-size`,
/// `batch-parallelism`, `batch-fail-fast`).
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub max_batch_size: usize,
    pub batch_parallelism: usize,
    pub batch_fail_fast: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            batch_parallelism: 10,
            batch_fail_fast: false,
        }
    }
}

/// Routes enrichment requests to a resolved enricher and executes them
/// through the pipeline, singly or in bounded-parallel batches.
pub struct SmartDispatcher {
    registry: Arc<EnricherRegistry>,
    pipeline: Arc<EnrichmentPipeline>,
    fallback: Arc<FallbackChainExecutor>,
    pub batch_settings: BatchSettings,
}

impl SmartDispatcher {
    pub fn new(
        registry: Arc<EnricherRegistry>,
        pipeline: Arc<EnrichmentPipeline>,
        batch_settings: BatchSettings,
    ) -> Self {
        let fallback = Arc::new(FallbackChainExecutor::new(registry.clone()));
        Self {
            registry,
            pipeline,
            fallback,
            batch_settings,
        }
    }

    /// §4.11 single dispatch: resolve by `(type, tenantId, priority)`,
    /// execute through the pipeline, following any declared fallback chain.
    pub async fn dispatch(&self, request: &EnrichmentRequest) -> FireflyResult<EnrichmentResponse> {
        let enricher = self
            .registry
            .select(&request.r#type, request.tenant_id)
            .ok_or_else(|| {
                FireflyError::not_found(format!(
                    "no enricher registered for type '{}'",
                    request.r#type
                ))
            })?;

        self.fallback
            .execute(request, enricher, request.tenant_id, |enricher, req| {
                let pipeline = self.pipeline.clone();
                async move { Ok(pipeline.execute(enricher, req).await) }
            })
            .await
    }

    /// §4.11 batch dispatch: group by `(type, tenantId)`, bound parallelism
    /// per group, and rebuild the response array in input order.
    pub async fn dispatch_batch(
        &self,
        requests: Vec<EnrichmentRequest>,
    ) -> FireflyResult<Vec<EnrichmentResponse>> {
        if requests.len() > self.batch_settings.max_batch_size {
            return Err(FireflyError::validation(format!(
                "batch size {} exceeds max-batch-size {}",
                requests.len(),
                self.batch_settings.max_batch_size
            )));
        }

        let mut groups: HashMap<(String, firefly_shared::TenantId), Vec<usize>> = HashMap::new();
        for (index, request) in requests.iter().enumerate() {
            groups
                .entry((request.r#type.to_lowercase(), request.tenant_id))
                .or_default()
                .push(index);
        }

        let mut results: Vec<Option<EnrichmentResponse>> = vec![None; requests.len()];
        let fail_fast = self.batch_settings.batch_fail_fast;
        let parallelism = self.batch_settings.batch_parallelism.max(1);

        // Order preserved by construction: `buffered` polls the underlying
        // futures in push order and yields them in that same order, while
        // bounding how many run concurrently (§5).
        for indices in groups.into_values() {
            let outcomes: Vec<(usize, FireflyResult<EnrichmentResponse>)> = stream::iter(indices)
                .map(|index| async move { (index, self.dispatch(&requests[index]).await) })
                .buffered(parallelism)
                .collect()
                .await;

            for (index, outcome) in outcomes {
                match outcome {
                    Ok(response) => results[index] = Some(response),
                    Err(err) => {
                        if fail_fast {
                            return Err(err);
                        }
                        results[index] = Some(EnrichmentResponse::failure(
                            &requests[index],
                            "unknown",
                            err.to_string(),
                            0,
                        ));
                    }
                }
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enricher::test_support::StubEnricher;
    use firefly_shared::audit::InMemoryJobAuditRepository;
    use firefly_shared::cache::NoopCache;
    use firefly_shared::events::RecordingEventPublisher;
    use firefly_shared::observability::TracingBackedContext;
    use firefly_shared::resilience::ResiliencyConfig;
    use firefly_shared::resilience::ResiliencyDecorator;
    use firefly_shared::TenantId;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    fn pipeline() -> Arc<EnrichmentPipeline> {
        Arc::new(EnrichmentPipeline {
            resiliency: Arc::new(ResiliencyDecorator::new(ResiliencyConfig::default())),
            tracing_ctx: Arc::new(TracingBackedContext::default()),
            cache: Arc::new(NoopCache),
            audit: Arc::new(InMemoryJobAuditRepository::new()),
            events: Arc::new(RecordingEventPublisher::new()),
            lineage: Arc::new(crate::lineage::InMemoryLineageTracker::new()),
            cost: Arc::new(crate::cost::CostTracker::new()),
            settings: crate::pipeline::PipelineSettings::default(),
        })
    }

    fn request(r#type: &str, tenant: TenantId) -> EnrichmentRequest {
        EnrichmentRequest {
            r#type: r#type.to_string(),
            tenant_id: tenant,
            source_data: StdHashMap::new(),
            parameters: StdHashMap::new(),
            strategy: crate::model::MergeStrategy::Enhance,
            request_id: None,
            correlation_id: None,
        }
    }

    /// §8 S3 — smart routing by priority.
    #[tokio::test]
    async fn s3_smart_routing_by_priority() {
        let a = StubEnricher::new("a", "credit-report", 100, TenantId::GLOBAL)
            .with_mapped(StdHashMap::from([("from".to_string(), json!("a"))]));
        let b = StubEnricher::new("b", "credit-report", 50, TenantId::GLOBAL)
            .with_mapped(StdHashMap::from([("from".to_string(), json!("b"))]));
        let registry = Arc::new(EnricherRegistry::new(vec![Arc::new(a), Arc::new(b)]).unwrap());
        let dispatcher = SmartDispatcher::new(registry, pipeline(), BatchSettings::default());

        let response = dispatcher
            .dispatch(&request("credit-report", TenantId::GLOBAL))
            .await
            .unwrap();
        assert_eq!(response.provider_name, "a");
    }

    #[tokio::test]
    async fn unknown_type_returns_not_found() {
        let registry = Arc::new(EnricherRegistry::new(vec![]).unwrap());
        let dispatcher = SmartDispatcher::new(registry, pipeline(), BatchSettings::default());
        let result = dispatcher.dispatch(&request("missing-type", TenantId::GLOBAL)).await;
        assert!(matches!(result, Err(FireflyError::NotFound(_))));
    }

    /// §8 S4 — batch preserves order.
    #[tokio::test]
    async fn s4_batch_preserves_order() {
        let t1 = TenantId::from(uuid::Uuid::new_v4());
        let t2 = TenantId::from(uuid::Uuid::new_v4());
        let e1 = StubEnricher::new("t1-provider", "credit-report", 50, t1)
            .with_mapped(StdHashMap::from([("tenant".to_string(), json!("t1"))]));
        let e2 = StubEnricher::new("t2-provider", "credit-report", 50, t2)
            .with_mapped(StdHashMap::from([("tenant".to_string(), json!("t2"))]));
        let registry = Arc::new(EnricherRegistry::new(vec![Arc::new(e1), Arc::new(e2)]).unwrap());
        let dispatcher = SmartDispatcher::new(registry, pipeline(), BatchSettings::default());

        let requests = vec![
            request("credit-report", t1),
            request("credit-report", t2),
            request("credit-report", t1),
        ];
        let responses = dispatcher.dispatch_batch(requests).await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].provider_name, "t1-provider");
        assert_eq!(responses[1].provider_name, "t2-provider");
        assert_eq!(responses[2].provider_name, "t1-provider");
    }

    #[tokio::test]
    async fn batch_over_max_size_is_rejected() {
        let registry = Arc::new(EnricherRegistry::new(vec![]).unwrap());
        let settings = BatchSettings {
            max_batch_size: 2,
            ..Default::default()
        };
        let dispatcher = SmartDispatcher::new(registry, pipeline(), settings);
        let requests = vec![
            request("credit-report", TenantId::GLOBAL),
            request("credit-report", TenantId::GLOBAL),
            request("credit-report", TenantId::GLOBAL),
        ];
        let result = dispatcher.dispatch_batch(requests).await;
        assert!(matches!(result, Err(FireflyError::Validation(_))));
    }

    #[tokio::test]
    async fn non_fail_fast_batch_reports_per_item_failure() {
        let registry = Arc::new(EnricherRegistry::new(vec![]).unwrap());
        let dispatcher = SmartDispatcher::new(registry, pipeline(), BatchSettings::default());
        let requests = vec![request("missing-type", TenantId::GLOBAL)];
        let responses = dispatcher.dispatch_batch(requests).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert!(!responses[0].success);
    }

    #[tokio::test]
    async fn fail_fast_batch_aborts_on_first_failure() {
        let registry = Arc::new(EnricherRegistry::new(vec![]).unwrap());
        let settings = BatchSettings {
            batch_fail_fast: true,
            ..Default::default()
        };
        let dispatcher = SmartDispatcher::new(registry, pipeline(), settings);
        let requests = vec![request("missing-type", TenantId::GLOBAL)];
        let result = dispatcher.dispatch_batch(requests).await;
        assert!(result.is_err());
    }
}
