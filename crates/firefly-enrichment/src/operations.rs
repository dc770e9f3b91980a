//! # Operation Dispatcher (§4.12, §2.12)
//!
//! Each enricher may expose zero or more named auxiliary operations,
//! described by JSON schema and addressable independently of the main
//! enrichment endpoint (GLOSSARY "Operation"). `OperationDispatcher`
//! resolves the enricher (same rules as the smart dispatcher), locates the
//! operation, validates the request against its schema, and executes it
//! with the same resiliency/observability composition as §4.1/§4.2.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use firefly_shared::error::{FireflyError, FireflyResult};
use firefly_shared::observability::TracingContext;
use firefly_shared::resilience::ResiliencyDecorator;
use firefly_shared::TenantId;

use crate::registry::EnricherRegistry;

/// Describes one named operation exposed by an enricher (§4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub operation_id: String,
    pub description: String,
    pub http_method: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requires_auth: bool,
    pub request_type: String,
    pub response_type: String,
    pub request_schema: Value,
    pub response_schema: Value,
    #[serde(default)]
    pub request_example: Option<Value>,
    #[serde(default)]
    pub response_example: Option<Value>,
}

/// Result of dispatching a named operation (§6 `POST /operations/execute`).
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub provider_name: String,
    pub operation_id: String,
    pub response: Value,
    pub duration_millis: u64,
}

/// Resolves an enricher + operation, validates the request, and executes it
/// under the resiliency decorator.
#[derive(Debug)]
pub struct OperationDispatcher {
    registry: Arc<EnricherRegistry>,
    resiliency: Arc<ResiliencyDecorator>,
    tracing_ctx: Arc<dyn TracingContext>,
}

impl OperationDispatcher {
    pub fn new(
        registry: Arc<EnricherRegistry>,
        resiliency: Arc<ResiliencyDecorator>,
        tracing_ctx: Arc<dyn TracingContext>,
    ) -> Self {
        Self {
            registry,
            resiliency,
            tracing_ctx,
        }
    }

    /// §4.12 `executeOperation`: resolve → locate → validate → execute.
    pub async fn execute(
        &self,
        r#type: &str,
        tenant_id: TenantId,
        operation_id: &str,
        request: Value,
    ) -> FireflyResult<OperationResult> {
        let started = Instant::now();
        let enricher = self
            .registry
            .select(r#type, tenant_id)
            .ok_or_else(|| FireflyError::not_found(format!("no enricher for type '{type}'")))?;

        let operation = enricher
            .operations()
            .into_iter()
            .find(|op| op.operation_id == operation_id)
            .ok_or_else(|| {
                FireflyError::not_found(format!(
                    "operation '{operation_id}' not found on provider '{}'",
                    enricher.metadata().provider_name
                ))
            })?;

        validate_against_schema(&operation.request_schema, &request)?;

        let _span = self.tracing_ctx.start_span(
            &format!("operation.{operation_id}"),
            Some(&tenant_id.to_string()),
        );

        let provider_name = enricher.metadata().provider_name.clone();
        let response = self
            .resiliency
            .call(&provider_name, operation_id, || {
                let enricher = enricher.clone();
                let request = request.clone();
                async move { enricher.execute_operation(operation_id, request).await }
            })
            .await?;

        Ok(OperationResult {
            provider_name,
            operation_id: operation_id.to_string(),
            response,
            duration_millis: started.elapsed().as_millis() as u64,
        })
    }
}

/// Validate `request` against `schema` using JSON Schema. An empty object
/// schema (`{}`) is treated as "no constraints" rather than an error.
fn validate_against_schema(schema: &Value, request: &Value) -> FireflyResult<()> {
    if schema.is_null() || schema == &Value::Object(Default::default()) {
        return Ok(());
    }
    let compiled = jsonschema::validator_for(schema)
        .map_err(|e| FireflyError::validation(format!("invalid operation schema: {e}")))?;
    if let Err(errors) = compiled.validate(request) {
        return Err(FireflyError::validation(errors.to_string()));
    }
    Ok(())
}
