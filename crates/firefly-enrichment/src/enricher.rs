//! # Enricher Trait (§2.9, §4.9)
//!
//! `Enricher` is the seam provider adapters implement: static metadata plus
//! the two provider-specific steps of the pipeline (`fetch_provider_data`,
//! `map_to_target`). Everything else in §4.9 (resiliency, cache, strategy
//! merge, lineage/audit/event side effects) is composed around the trait by
//! [`crate::pipeline::EnrichmentPipeline`] rather than inherited, per §9's
//! "replace inheritance with composition" redesign flag.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use firefly_shared::error::{FireflyError, FireflyResult};

use crate::model::{EnricherMetadata, EnrichmentRequest};
use crate::operations::OperationMetadata;

/// A provider-specific adapter that fetches external data and maps it to a
/// common target shape (GLOSSARY "Enricher").
#[async_trait]
pub trait Enricher: Send + Sync + std::fmt::Debug {
    /// Static metadata describing this enricher instance.
    fn metadata(&self) -> &EnricherMetadata;

    /// Call the upstream provider and return its raw response.
    async fn fetch_provider_data(&self, request: &EnrichmentRequest) -> FireflyResult<Value>;

    /// Map the provider's raw response onto the common target shape.
    async fn map_to_target(&self, raw: &Value) -> FireflyResult<HashMap<String, Value>>;

    /// Named auxiliary operations this enricher exposes (§4.12). Most
    /// enrichers expose none.
    fn operations(&self) -> Vec<OperationMetadata> {
        Vec::new()
    }

    /// Execute a named operation by id. The default implementation reports
    /// every operation as unknown; enrichers overriding [`Self::operations`]
    /// must also override this.
    async fn execute_operation(&self, operation_id: &str, _request: Value) -> FireflyResult<Value> {
        Err(FireflyError::not_found(format!(
            "operation '{operation_id}' is not registered on this enricher"
        )))
    }

    /// Liveness probe consulted by the health discovery handler (§4.13).
    async fn health(&self) -> bool {
        true
    }

    /// Whether successful responses from this enricher may be cached.
    /// Enrichers returning highly volatile data override this to `false`.
    fn cacheable(&self) -> bool {
        true
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    use super::*;
    use firefly_shared::TenantId;

    /// Minimal, fully in-memory `Enricher` used across the enrichment
    /// crate's unit tests: returns a fixed provider payload unless
    /// configured to fail. Mirrors `firefly_jobs::orchestrator::test_support::InMemoryOrchestrator`.
    #[derive(Debug, Clone)]
    pub struct StubEnricher {
        pub metadata: EnricherMetadata,
        pub raw: Value,
        pub mapped: HashMap<String, Value>,
        pub fail_with: Option<String>,
    }

    impl StubEnricher {
        pub fn new(provider: &str, r#type: &str, priority: i32, tenant: TenantId) -> Self {
            Self {
                metadata: EnricherMetadata::builder()
                    .provider_name(provider)
                    .r#type(r#type)
                    .priority(priority)
                    .tenant_id(tenant)
                    .build(),
                raw: Value::Null,
                mapped: HashMap::new(),
                fail_with: None,
            }
        }

        pub fn with_mapped(mut self, mapped: HashMap<String, Value>) -> Self {
            self.mapped = mapped;
            self
        }

        pub fn failing(mut self, message: impl Into<String>) -> Self {
            self.fail_with = Some(message.into());
            self
        }
    }

    #[async_trait]
    impl Enricher for StubEnricher {
        fn metadata(&self) -> &EnricherMetadata {
            &self.metadata
        }

        async fn fetch_provider_data(&self, _request: &EnrichmentRequest) -> FireflyResult<Value> {
            if let Some(message) = &self.fail_with {
                return Err(FireflyError::provider_error(&self.metadata.provider_name, message));
            }
            Ok(self.raw.clone())
        }

        async fn map_to_target(&self, _raw: &Value) -> FireflyResult<HashMap<String, Value>> {
            Ok(self.mapped.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use firefly_shared::TenantId;

    use super::test_support::StubEnricher;
    use super::*;

    #[test]
    fn stub_enricher_exposes_builder_metadata() {
        let stub = StubEnricher::new("acme", "credit-report", 90, TenantId::GLOBAL);
        assert_eq!(stub.metadata().provider_name, "acme");
        assert_eq!(stub.metadata().priority, 90);
    }
}
