//! # Transformation Chain (§2.5, §4.5)
//!
//! A sequential, async per-step map→map pipeline: each [`Transformer`] takes
//! the previous step's output and produces the next step's input. An empty
//! chain returns the source unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use firefly_shared::error::FireflyResult;
use firefly_shared::TenantId;

/// Context threaded through every step of a transformation chain (§4.5).
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub request_id: Option<String>,
    pub tenant_id: TenantId,
    pub metadata: HashMap<String, Value>,
    pub start_time: DateTime<Utc>,
}

impl TransformContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            request_id: None,
            tenant_id,
            metadata: HashMap::new(),
            start_time: Utc::now(),
        }
    }
}

/// One step of a transformation chain: `value -> value'`.
#[async_trait]
pub trait Transformer: Send + Sync + std::fmt::Debug {
    async fn transform(&self, value: Value, ctx: &TransformContext) -> FireflyResult<Value>;
}

/// Ordered list of transformers executed in sequence (§4.5).
#[derive(Debug, Default, Clone)]
pub struct TransformationChain {
    steps: Vec<Arc<dyn Transformer>>,
}

impl TransformationChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, step: Arc<dyn Transformer>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fold `source` through every step; an empty chain returns `source`
    /// unchanged.
    pub async fn execute(&self, source: Value, ctx: &TransformContext) -> FireflyResult<Value> {
        let mut current = source;
        for step in &self.steps {
            current = step.transform(current, ctx).await?;
        }
        Ok(current)
    }
}

/// Renames object keys per `mapping` (old → new). Source keys absent from
/// the mapping are ignored (left as-is); keys not present in the source
/// value are simply not produced. The input value is never mutated in
/// place — a fresh object is built.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    mapping: HashMap<String, String>,
}

impl FieldMapping {
    pub fn new(mapping: HashMap<String, String>) -> Self {
        Self { mapping }
    }
}

#[async_trait]
impl Transformer for FieldMapping {
    async fn transform(&self, value: Value, _ctx: &TransformContext) -> FireflyResult<Value> {
        let Some(obj) = value.as_object() else {
            return Ok(value);
        };
        let mut out = serde_json::Map::with_capacity(obj.len());
        for (key, val) in obj {
            let target_key = self.mapping.get(key).cloned().unwrap_or_else(|| key.clone());
            out.insert(target_key, val.clone());
        }
        Ok(Value::Object(out))
    }
}

/// Computes a value from an unmodifiable view of the current object and
/// stores it under `field`, overwriting any existing key of that name.
pub struct ComputedField {
    field: String,
    compute: Box<dyn Fn(&Value) -> Value + Send + Sync>,
}

impl ComputedField {
    pub fn new(field: impl Into<String>, compute: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self {
            field: field.into(),
            compute: Box::new(compute),
        }
    }
}

impl std::fmt::Debug for ComputedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedField").field("field", &self.field).finish()
    }
}

#[async_trait]
impl Transformer for ComputedField {
    async fn transform(&self, value: Value, _ctx: &TransformContext) -> FireflyResult<Value> {
        let computed = (self.compute)(&value);
        let mut out = value;
        let obj = out.as_object_mut().get_or_insert_with(Default::default);
        obj.insert(self.field.clone(), computed);
        Ok(out)
    }
}
