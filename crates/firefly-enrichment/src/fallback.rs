//! # Fallback Chain Executor (§2.10, §4.10)
//!
//! Traverses an enricher's declared `@fallbackTo` chain when the primary's
//! outcome matches the configured trigger policy. Recursion depth is
//! bounded by `maxFallbacks`; a visited-provider set detects cycles and
//! aborts with `FallbackLoop` rather than looping forever.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use firefly_shared::error::{FireflyError, FireflyResult};
use firefly_shared::TenantId;

use crate::enricher::Enricher;
use crate::model::{EnrichmentRequest, EnrichmentResponse, FallbackTrigger};
use crate::registry::EnricherRegistry;

/// Whether `response` matches `trigger` and a fallback hop should be taken.
pub fn should_fallback(trigger: FallbackTrigger, response: &EnrichmentResponse) -> bool {
    match trigger {
        FallbackTrigger::OnError => !response.success,
        FallbackTrigger::OnEmpty => response.success && response.enriched_data.is_empty(),
        FallbackTrigger::OnErrorOrEmpty => !response.success || response.enriched_data.is_empty(),
    }
}

/// Walks the fallback chain declared on an enricher's metadata.
#[derive(Debug)]
pub struct FallbackChainExecutor {
    registry: Arc<EnricherRegistry>,
}

impl FallbackChainExecutor {
    pub fn new(registry: Arc<EnricherRegistry>) -> Self {
        Self { registry }
    }

    /// Run `start` via `run`, and keep following `@fallbackTo` hops while
    /// the response matches the declared trigger, up to `maxFallbacks` hops
    /// or until a cycle is detected.
    pub async fn execute<F, Fut>(
        &self,
        request: &EnrichmentRequest,
        start: Arc<dyn Enricher>,
        tenant_id: TenantId,
        mut run: F,
    ) -> FireflyResult<EnrichmentResponse>
    where
        F: FnMut(Arc<dyn Enricher>, &EnrichmentRequest) -> Fut,
        Fut: Future<Output = FireflyResult<EnrichmentResponse>>,
    {
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = start;
        let mut hops = 0u32;

        loop {
            visited.insert(current.metadata().provider_name.to_lowercase());
            let response = run(current.clone(), request).await?;

            let Some(fallback) = current.metadata().fallback.clone() else {
                return Ok(response);
            };
            if !should_fallback(fallback.strategy, &response) {
                return Ok(response);
            }
            if hops >= fallback.max_fallbacks {
                return Ok(response);
            }

            let next_key = fallback.target_provider_name.to_lowercase();
            if visited.contains(&next_key) {
                return Err(FireflyError::FallbackLoop(fallback.target_provider_name.clone()));
            }

            let next = self
                .registry
                .by_provider_and_tenant(&fallback.target_provider_name, tenant_id)
                .or_else(|| {
                    self.registry
                        .by_provider_and_tenant(&fallback.target_provider_name, TenantId::GLOBAL)
                })
                .cloned()
                .ok_or_else(|| {
                    FireflyError::not_found(format!(
                        "fallback target '{}' not found",
                        fallback.target_provider_name
                    ))
                })?;

            hops += 1;
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enricher::test_support::StubEnricher;
    use crate::model::FallbackSpec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn response(success: bool, enriched: HashMap<String, serde_json::Value>, provider: &str) -> EnrichmentResponse {
        EnrichmentResponse {
            success,
            enriched_data: enriched,
            provider_name: provider.to_string(),
            r#type: "credit-report".to_string(),
            strategy: crate::model::MergeStrategy::Enhance,
            fields_enriched: 0,
            error: None,
            correlation_id: None,
            duration_millis: 0,
        }
    }

    fn request() -> EnrichmentRequest {
        EnrichmentRequest {
            r#type: "credit-report".to_string(),
            tenant_id: TenantId::GLOBAL,
            source_data: HashMap::new(),
            parameters: HashMap::new(),
            strategy: crate::model::MergeStrategy::Enhance,
            request_id: None,
            correlation_id: None,
        }
    }

    #[tokio::test]
    async fn falls_back_to_declared_target_on_error() {
        let mut primary = StubEnricher::new("primary", "credit-report", 90, TenantId::GLOBAL);
        primary.metadata.fallback = Some(FallbackSpec {
            target_provider_name: "secondary".to_string(),
            strategy: FallbackTrigger::OnError,
            max_fallbacks: 3,
        });
        let secondary = StubEnricher::new("secondary", "credit-report", 50, TenantId::GLOBAL);
        let registry = Arc::new(
            EnricherRegistry::new(vec![Arc::new(primary), Arc::new(secondary)]).unwrap(),
        );
        let executor = FallbackChainExecutor::new(registry.clone());
        let primary_ref = registry.by_provider_name("primary")[0].clone();

        let calls = AtomicU32::new(0);
        let result = executor
            .execute(&request(), primary_ref, TenantId::GLOBAL, |enricher, _req| {
                calls.fetch_add(1, Ordering::SeqCst);
                let name = enricher.metadata().provider_name.clone();
                async move {
                    if name == "primary" {
                        Ok(response(false, HashMap::new(), "primary"))
                    } else {
                        Ok(response(true, HashMap::from([("a".to_string(), serde_json::json!(1))]), "secondary"))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.provider_name, "secondary");
        assert!(result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_fallback_declared_returns_primary_response_unchanged() {
        let primary = StubEnricher::new("solo", "credit-report", 90, TenantId::GLOBAL);
        let registry = Arc::new(EnricherRegistry::new(vec![Arc::new(primary)]).unwrap());
        let executor = FallbackChainExecutor::new(registry.clone());
        let primary_ref = registry.by_provider_name("solo")[0].clone();

        let result = executor
            .execute(&request(), primary_ref, TenantId::GLOBAL, |_enricher, _req| async {
                Ok(response(false, HashMap::new(), "solo"))
            })
            .await
            .unwrap();

        assert_eq!(result.provider_name, "solo");
        assert!(!result.success);
    }

    #[tokio::test]
    async fn circular_fallback_reference_aborts_with_fallback_loop() {
        let mut a = StubEnricher::new("a", "credit-report", 90, TenantId::GLOBAL);
        a.metadata.fallback = Some(FallbackSpec {
            target_provider_name: "b".to_string(),
            strategy: FallbackTrigger::OnError,
            max_fallbacks: 5,
        });
        let mut b = StubEnricher::new("b", "credit-report", 50, TenantId::GLOBAL);
        b.metadata.fallback = Some(FallbackSpec {
            target_provider_name: "a".to_string(),
            strategy: FallbackTrigger::OnError,
            max_fallbacks: 5,
        });
        let registry = Arc::new(EnricherRegistry::new(vec![Arc::new(a), Arc::new(b)]).unwrap());
        let executor = FallbackChainExecutor::new(registry.clone());
        let a_ref = registry.by_provider_name("a")[0].clone();

        let result = executor
            .execute(&request(), a_ref, TenantId::GLOBAL, |enricher, _req| {
                let name = enricher.metadata().provider_name.clone();
                async move { Ok(response(false, HashMap::new(), &name)) }
            })
            .await;

        assert!(matches!(result, Err(FireflyError::FallbackLoop(_))));
    }

    #[tokio::test]
    async fn max_fallbacks_bounds_the_chain() {
        let mut primary = StubEnricher::new("primary", "credit-report", 90, TenantId::GLOBAL);
        primary.metadata.fallback = Some(FallbackSpec {
            target_provider_name: "secondary".to_string(),
            strategy: FallbackTrigger::OnError,
            max_fallbacks: 0,
        });
        let secondary = StubEnricher::new("secondary", "credit-report", 50, TenantId::GLOBAL);
        let registry = Arc::new(
            EnricherRegistry::new(vec![Arc::new(primary), Arc::new(secondary)]).unwrap(),
        );
        let executor = FallbackChainExecutor::new(registry.clone());
        let primary_ref = registry.by_provider_name("primary")[0].clone();

        let calls = AtomicU32::new(0);
        let result = executor
            .execute(&request(), primary_ref, TenantId::GLOBAL, |enricher, _req| {
                calls.fetch_add(1, Ordering::SeqCst);
                let name = enricher.metadata().provider_name.clone();
                async move { Ok(response(false, HashMap::new(), &name)) }
            })
            .await
            .unwrap();

        assert_eq!(result.provider_name, "primary");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
