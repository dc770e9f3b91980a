//! # Enricher Base + Strategy Application (§2.9, §4.9)
//!
//! `EnrichmentPipeline` composes resiliency, caching, strategy merge, and
//! the lineage/audit/event/cost side effects around a bare [`Enricher`]
//! (§9: composition over inheritance). `EnrichmentPipeline::execute` is the
//! single entry point both the smart dispatcher (§4.11) and the fallback
//! executor (§4.10) call into.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use firefly_shared::audit::{AuditEventType, JobAuditEntry, JobAuditRepository};
use firefly_shared::cache::CacheAdapter;
use firefly_shared::error::{FireflyError, FireflyResult};
use firefly_shared::events::{topics, EventPublisher};
use firefly_shared::hashing;
use firefly_shared::observability::TracingContext;
use firefly_shared::resilience::ResiliencyDecorator;
use firefly_shared::JobStage;

use crate::cost::CostTracker;
use crate::enricher::Enricher;
use crate::lineage::{LineageOperation, LineageRecord, LineageTracker};
use crate::model::{EnrichmentRequest, EnrichmentResponse};
use crate::strategy;

/// Tunables that would otherwise live on `EnrichmentConfig` but are read
/// directly by the pipeline rather than threaded field-by-field.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub cache_enabled: bool,
    pub cache_ttl: std::time::Duration,
    pub lineage_enabled: bool,
    pub publish_events: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cache_enabled: false,
            cache_ttl: std::time::Duration::from_secs(3600),
            lineage_enabled: false,
            publish_events: true,
        }
    }
}

/// Owns the cross-cutting infrastructure every enrichment call is wrapped
/// in: resiliency, observability, cache, audit, events, lineage, cost.
pub struct EnrichmentPipeline {
    pub resiliency: Arc<ResiliencyDecorator>,
    pub tracing_ctx: Arc<dyn TracingContext>,
    pub cache: Arc<dyn CacheAdapter>,
    pub audit: Arc<dyn JobAuditRepository>,
    pub events: Arc<dyn EventPublisher>,
    pub lineage: Arc<dyn LineageTracker>,
    pub cost: Arc<CostTracker>,
    pub settings: PipelineSettings,
}

impl EnrichmentPipeline {
    /// Run the full §4.9 pipeline for one enrichment request against one
    /// resolved enricher. Never propagates an error for business-level
    /// failures — those are reported as `success=false` responses, per
    /// §7 "EnrichmentResponse failures always include success=false".
    pub async fn execute(&self, enricher: Arc<dyn Enricher>, request: &EnrichmentRequest) -> EnrichmentResponse {
        let started = Instant::now();
        let provider_name = enricher.metadata().provider_name.clone();

        // Step 1: validate.
        if let Err(err) = self.validate(&enricher, request) {
            return self.fail(request, &provider_name, err, started).await;
        }

        // Step 2: span + OPERATION_STARTED audit.
        let span = self
            .tracing_ctx
            .start_span("enrichment", Some(&request.tenant_id.to_string()));
        self.append_audit(
            JobAuditEntry::new(JobStage::All, AuditEventType::OperationStarted)
                .with_execution_id(provider_name.clone()),
        )
        .await;
        self.publish(
            topics::ENRICHMENT_STARTED,
            serde_json::json!({"provider": provider_name, "type": request.r#type}),
        )
        .await;

        // Step 3: cache lookup.
        let cache_key = self.cache_key(request);
        if self.settings.cache_enabled {
            match self.cache.get(&cache_key).await {
                Ok(Some(cached)) => {
                    if let Some(response) = Self::response_from_cache(&cached, request, &provider_name) {
                        self.publish(topics::CACHE_HIT, serde_json::json!({"key": cache_key})).await;
                        self.publish_completed(&response).await;
                        drop(span);
                        return response;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "cache lookup failed, continuing without cache");
                }
            }
        }

        // Steps 4-8, wrapped in resiliency.
        let retry_audit_provider = provider_name.clone();
        let retry_audit_repo = self.audit.clone();
        let fetch_result = self
            .resiliency
            .call_observed(
                &provider_name,
                "_enrich",
                move |attempt, err| {
                    let entry = JobAuditEntry::new(JobStage::All, AuditEventType::OperationRetried)
                        .with_execution_id(retry_audit_provider.clone())
                        .with_error(err.to_string());
                    let entry = JobAuditEntry {
                        retry_attempts: Some(attempt),
                        ..entry
                    };
                    let repo = retry_audit_repo.clone();
                    tokio::spawn(async move {
                        let _ = repo.append(entry).await;
                    });
                },
                || {
                    let enricher = enricher.clone();
                    let request = request.clone();
                    async move {
                        let raw = enricher.fetch_provider_data(&request).await?;
                        let mapped = enricher.map_to_target(&raw).await?;
                        Ok::<_, FireflyError>(mapped)
                    }
                },
            )
            .await;

        let mapped = match fetch_result {
            Ok(mapped) => mapped,
            Err(err) => return self.fail(request, &provider_name, err, started).await,
        };

        let (merged, fields_enriched) = strategy::apply(&request.source_data, &mapped, request.strategy);

        // Step 8: lineage, cost, cache put.
        if self.settings.lineage_enabled {
            let entity_id = request
                .request_id
                .clone()
                .unwrap_or_else(|| request.r#type.clone());
            let input_hash = hashing::content_hash(&serde_json::to_value(&request.source_data).unwrap_or_default());
            let output_hash = hashing::content_hash(&serde_json::to_value(&merged).unwrap_or_default());
            let record = LineageRecord::new(
                entity_id,
                "firefly-enrichment",
                LineageOperation::Enrichment,
                provider_name.clone(),
                input_hash,
                output_hash,
                Some(span.trace_id().to_string()),
            );
            if let Err(err) = self.lineage.record(record).await {
                tracing::warn!(error = %err, "lineage record failed");
            }
            self.publish(topics::LINEAGE_RECORDED, serde_json::json!({"provider": provider_name})).await;
        }

        let result_value = serde_json::to_value(&merged).unwrap_or_default();
        self.cost
            .record_call(&provider_name, &request.r#type, hashing::utf8_json_len(&result_value) as u64);

        if self.settings.cache_enabled && enricher.cacheable() {
            if let Err(err) = self.cache.put(&cache_key, result_value, self.settings.cache_ttl).await {
                tracing::warn!(error = %err, "cache put failed");
            }
        }

        let response = EnrichmentResponse {
            success: true,
            enriched_data: merged,
            provider_name: provider_name.clone(),
            r#type: request.r#type.clone(),
            strategy: request.strategy,
            fields_enriched,
            error: None,
            correlation_id: request.correlation_id.clone(),
            duration_millis: started.elapsed().as_millis() as u64,
        };

        self.append_audit(
            JobAuditEntry::new(JobStage::All, AuditEventType::OperationCompleted)
                .with_execution_id(provider_name),
        )
        .await;
        self.publish_completed(&response).await;

        response
    }

    fn validate(&self, enricher: &Arc<dyn Enricher>, request: &EnrichmentRequest) -> FireflyResult<()> {
        request.validate()?;
        let meta = enricher.metadata();
        if meta.r#type.to_lowercase() != request.r#type.to_lowercase() {
            return Err(FireflyError::validation(format!(
                "enricher type '{}' does not match request type '{}'",
                meta.r#type, request.r#type
            )));
        }
        if !meta.tenant_id.is_global() && meta.tenant_id != request.tenant_id {
            return Err(FireflyError::validation("enricher tenant does not match request tenant"));
        }
        Ok(())
    }

    fn cache_key(&self, request: &EnrichmentRequest) -> String {
        hashing::cache_key(
            &request.r#type,
            &request.tenant_id.to_string(),
            &serde_json::to_value(&request.source_data).unwrap_or_default(),
            &serde_json::to_value(&request.parameters).unwrap_or_default(),
            &request.strategy.to_string(),
        )
    }

    fn response_from_cache(
        cached: &Value,
        request: &EnrichmentRequest,
        provider_name: &str,
    ) -> Option<EnrichmentResponse> {
        let enriched_data: HashMap<String, Value> = serde_json::from_value(cached.clone()).ok()?;
        let (merged, fields_enriched) = strategy::apply(&request.source_data, &enriched_data, request.strategy);
        Some(EnrichmentResponse {
            success: true,
            enriched_data: merged,
            provider_name: provider_name.to_string(),
            r#type: request.r#type.clone(),
            strategy: request.strategy,
            fields_enriched,
            error: None,
            correlation_id: request.correlation_id.clone(),
            duration_millis: 0,
        })
    }

    async fn fail(
        &self,
        request: &EnrichmentRequest,
        provider_name: &str,
        err: FireflyError,
        started: Instant,
    ) -> EnrichmentResponse {
        self.append_audit(
            JobAuditEntry::new(JobStage::All, AuditEventType::OperationFailed)
                .with_execution_id(provider_name.to_string())
                .with_error(err.to_string()),
        )
        .await;
        self.publish(
            topics::ENRICHMENT_FAILED,
            serde_json::json!({"provider": provider_name, "error": err.to_string()}),
        )
        .await;
        EnrichmentResponse::failure(
            request,
            provider_name,
            err.to_string(),
            started.elapsed().as_millis() as u64,
        )
    }

    async fn append_audit(&self, entry: JobAuditEntry) {
        if let Err(err) = self.audit.append(entry).await {
            tracing::warn!(error = %err, "audit append failed");
        }
    }

    async fn publish(&self, topic: &str, payload: Value) {
        if !self.settings.publish_events {
            return;
        }
        if let Err(err) = self.events.publish(topic, payload).await {
            tracing::warn!(error = %err, topic, "event publish failed");
        }
    }

    async fn publish_completed(&self, response: &EnrichmentResponse) {
        self.publish(
            topics::ENRICHMENT_COMPLETED,
            serde_json::json!({
                "provider": response.provider_name,
                "type": response.r#type,
                "fieldsEnriched": response.fields_enriched,
            }),
        )
        .await;
    }
}
