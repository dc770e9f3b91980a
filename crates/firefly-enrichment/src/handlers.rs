//! # Enrichment HTTP-shaped handlers (§6)
//!
//! Plain async functions, one per row of §6's enrichment table. No HTTP
//! framework dependency lives here — a host wires these to whatever router
//! it uses; the method/path documented on each function is the stable
//! contract the host must preserve bit-exact.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use firefly_shared::error::FireflyResult;
use firefly_shared::TenantId;

use crate::discovery::{DiscoveryService, HealthReport, ProviderInfo};
use crate::dispatcher::SmartDispatcher;
use crate::model::{EnrichmentRequest, EnrichmentResponse};
use crate::operations::{OperationDispatcher, OperationResult};

/// Composes the dispatchers and discovery service behind the §6 enrichment
/// endpoints. Construct once per process and share via `Arc`.
pub struct EnrichmentHandlers {
    pub dispatcher: Arc<SmartDispatcher>,
    pub operations: Arc<OperationDispatcher>,
    pub discovery: Arc<DiscoveryService>,
}

#[derive(Debug, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderOperations {
    pub provider_name: String,
    pub operations: Vec<crate::operations::OperationMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteOperationRequest {
    pub r#type: String,
    pub tenant_id: TenantId,
    pub operation_id: String,
    pub request: Value,
}

impl EnrichmentHandlers {
    /// `POST /api/v1/enrichment/smart`.
    pub async fn smart(&self, request: EnrichmentRequest) -> FireflyResult<EnrichmentResponse> {
        self.dispatcher.dispatch(&request).await
    }

    /// `POST /api/v1/enrichment/smart/batch`.
    pub async fn smart_batch(
        &self,
        requests: Vec<EnrichmentRequest>,
    ) -> FireflyResult<Vec<EnrichmentResponse>> {
        self.dispatcher.dispatch_batch(requests).await
    }

    /// `GET /api/v1/enrichment/providers?type=&tenantId=`.
    pub fn providers(&self, filter: ListFilter) -> Vec<ProviderInfo> {
        let mut providers = self.discovery.list_providers(filter.r#type.as_deref());
        if let Some(tenant) = filter.tenant_id {
            providers.retain(|p| p.tenant_id == tenant || p.tenant_id.is_global());
        }
        providers
    }

    /// `GET /api/v1/enrichment/health?type=&tenantId=`.
    pub async fn health(&self, filter: ListFilter) -> HealthReport {
        self.discovery.health(filter.r#type.as_deref()).await
    }

    /// `GET /api/v1/enrichment/operations?type=&tenantId=`.
    pub fn operations_listing(&self, filter: ListFilter) -> Vec<ProviderOperations> {
        self.providers(filter)
            .into_iter()
            .filter(|p| !p.operations.is_empty())
            .map(|p| ProviderOperations {
                provider_name: p.provider_name,
                operations: p.operations,
            })
            .collect()
    }

    /// `POST /api/v1/enrichment/operations/execute`.
    pub async fn operations_execute(
        &self,
        request: ExecuteOperationRequest,
    ) -> FireflyResult<OperationResult> {
        self.operations
            .execute(&request.r#type, request.tenant_id, &request.operation_id, request.request)
            .await
    }

    /// `GET /api/v1/enrichment/costs`.
    pub fn costs(&self) -> crate::cost::CostReport {
        self.discovery.cost_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enricher::test_support::StubEnricher;
    use crate::pipeline::{EnrichmentPipeline, PipelineSettings};
    use crate::registry::EnricherRegistry;
    use firefly_shared::audit::InMemoryJobAuditRepository;
    use firefly_shared::cache::NoopCache;
    use firefly_shared::events::RecordingEventPublisher;
    use firefly_shared::observability::TracingBackedContext;
    use firefly_shared::resilience::{ResiliencyConfig, ResiliencyDecorator};
    use serde_json::json;
    use std::collections::HashMap;

    fn handlers(enrichers: Vec<Arc<dyn crate::enricher::Enricher>>) -> EnrichmentHandlers {
        let registry = Arc::new(EnricherRegistry::new(enrichers).unwrap());
        let resiliency = Arc::new(ResiliencyDecorator::new(ResiliencyConfig::default()));
        let tracing_ctx = Arc::new(TracingBackedContext::default());
        let pipeline = Arc::new(EnrichmentPipeline {
            resiliency: resiliency.clone(),
            tracing_ctx: tracing_ctx.clone(),
            cache: Arc::new(NoopCache),
            audit: Arc::new(InMemoryJobAuditRepository::new()),
            events: Arc::new(RecordingEventPublisher::new()),
            lineage: Arc::new(crate::lineage::InMemoryLineageTracker::new()),
            cost: Arc::new(crate::cost::CostTracker::new()),
            settings: PipelineSettings::default(),
        });
        let dispatcher = Arc::new(SmartDispatcher::new(
            registry.clone(),
            pipeline.clone(),
            Default::default(),
        ));
        let operations = Arc::new(OperationDispatcher::new(registry.clone(), resiliency, tracing_ctx));
        let discovery = Arc::new(crate::discovery::DiscoveryService::new(
            registry,
            pipeline.cost.clone(),
            Duration::from_secs(1),
        ));
        EnrichmentHandlers {
            dispatcher,
            operations,
            discovery,
        }
    }

    fn request(r#type: &str) -> EnrichmentRequest {
        EnrichmentRequest {
            r#type: r#type.to_string(),
            tenant_id: TenantId::GLOBAL,
            source_data: HashMap::new(),
            parameters: HashMap::new(),
            strategy: crate::model::MergeStrategy::Enhance,
            request_id: None,
            correlation_id: None,
        }
    }

    #[tokio::test]
    async fn smart_dispatches_to_the_selected_enricher() {
        let stub = StubEnricher::new("acme", "credit-report", 50, TenantId::GLOBAL)
            .with_mapped(HashMap::from([("score".to_string(), json!(1))]));
        let handlers = handlers(vec![Arc::new(stub)]);
        let response = handlers.smart(request("credit-report")).await.unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn providers_filters_by_query_type() {
        let stub = StubEnricher::new("acme", "credit-report", 50, TenantId::GLOBAL);
        let handlers = handlers(vec![Arc::new(stub)]);
        let filtered = handlers.providers(ListFilter {
            r#type: Some("credit-report".to_string()),
            tenant_id: None,
        });
        assert_eq!(filtered.len(), 1);
        let empty = handlers.providers(ListFilter {
            r#type: Some("background-check".to_string()),
            tenant_id: None,
        });
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn operations_listing_omits_providers_with_no_operations() {
        let stub = StubEnricher::new("acme", "credit-report", 50, TenantId::GLOBAL);
        let handlers = handlers(vec![Arc::new(stub)]);
        assert!(handlers
            .operations_listing(ListFilter {
                r#type: None,
                tenant_id: None
            })
            .is_empty());
    }

    #[tokio::test]
    async fn costs_reflects_recorded_calls() {
        let stub = StubEnricher::new("acme", "credit-report", 50, TenantId::GLOBAL);
        let handlers = handlers(vec![Arc::new(stub)]);
        let _ = handlers.smart(request("credit-report")).await.unwrap();
        let report = handlers.costs();
        assert_eq!(report.totals.calls, 1);
    }
}
