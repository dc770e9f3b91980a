//! # Enrichment Data Model (§3)

use std::collections::{BTreeSet, HashMap};

use bon::Builder;
use firefly_shared::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use firefly_shared::error::{FireflyError, FireflyResult};

/// Merge strategy applied at step 7 of the enricher pipeline (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MergeStrategy {
    /// For each key in target not already set to a non-null in source,
    /// insert. Source wins on conflict.
    Enhance,
    /// Union; target wins on conflict; non-null wins over null.
    Merge,
    /// Result = target (source discarded).
    Replace,
    /// Result = target (source discarded); semantically identical to
    /// `Replace`, preserved for caller intent.
    Raw,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MergeStrategy::Enhance => "ENHANCE",
            MergeStrategy::Merge => "MERGE",
            MergeStrategy::Replace => "REPLACE",
            MergeStrategy::Raw => "RAW",
        };
        write!(f, "{s}")
    }
}

/// Static metadata describing one enricher instance (§3 `EnricherMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct EnricherMetadata {
    pub provider_name: String,
    #[builder(default = TenantId::GLOBAL)]
    pub tenant_id: TenantId,
    pub r#type: String,
    #[builder(default)]
    pub description: String,
    #[builder(default = "1.0.0".to_string())]
    pub version: String,
    #[builder(default)]
    pub tags: BTreeSet<String>,
    #[builder(default = 50)]
    pub priority: i32,
    #[builder(default = true)]
    pub enabled: bool,
    /// Fallback target providerName, strategy, and max hop count (§4.10).
    #[builder(default)]
    pub fallback: Option<FallbackSpec>,
}

impl EnricherMetadata {
    pub fn validate(&self) -> FireflyResult<()> {
        if self.provider_name.trim().is_empty() {
            return Err(FireflyError::validation("providerName must not be empty"));
        }
        if self.r#type.trim().is_empty() {
            return Err(FireflyError::validation("type must not be empty"));
        }
        if self.r#type != self.r#type.to_lowercase() {
            return Err(FireflyError::validation("type must be lowercase kebab-case"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackTrigger {
    OnError,
    OnEmpty,
    OnErrorOrEmpty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackSpec {
    pub target_provider_name: String,
    pub strategy: FallbackTrigger,
    #[serde(default = "default_max_fallbacks")]
    pub max_fallbacks: u32,
}

fn default_max_fallbacks() -> u32 {
    3
}

/// Caller-submitted enrichment request (§3 `EnrichmentRequest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub r#type: String,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub source_data: HashMap<String, Value>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub strategy: MergeStrategy,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl EnrichmentRequest {
    pub fn require_param(&self, key: &str) -> FireflyResult<&Value> {
        self.parameters
            .get(key)
            .ok_or_else(|| FireflyError::validation(format!("missing required parameter '{key}'")))
    }

    /// Validate structural invariants independent of a specific enricher
    /// (§4.9 step 1 runs enricher-specific checks on top of this).
    pub fn validate(&self) -> FireflyResult<()> {
        if self.r#type.trim().is_empty() {
            return Err(FireflyError::validation("request type must not be empty"));
        }
        Ok(())
    }
}

/// Response returned for a single enrichment request (§3 `EnrichmentResponse`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResponse {
    pub success: bool,
    pub enriched_data: HashMap<String, Value>,
    pub provider_name: String,
    pub r#type: String,
    pub strategy: MergeStrategy,
    pub fields_enriched: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub duration_millis: u64,
}

impl EnrichmentResponse {
    pub fn failure(
        request: &EnrichmentRequest,
        provider_name: impl Into<String>,
        error: impl Into<String>,
        duration_millis: u64,
    ) -> Self {
        Self {
            success: false,
            enriched_data: HashMap::new(),
            provider_name: provider_name.into(),
            r#type: request.r#type.clone(),
            strategy: request.strategy,
            fields_enriched: 0,
            error: Some(error.into()),
            correlation_id: request.correlation_id.clone(),
            duration_millis,
        }
    }
}
