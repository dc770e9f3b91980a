//! # Mapper Registry (§2.15, §4.15)
//!
//! Index of mapper handlers by target-class identifier. Registration
//! rejects duplicate target ids at startup, matching the registry-immutable
//! posture `firefly_enrichment::registry::EnricherRegistry` already
//! establishes for enricher lookups.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use firefly_shared::error::{FireflyError, FireflyResult};

/// Handler contract: `mapToTarget(sourceMap) -> targetObject` (§4.15).
pub trait Mapper: Send + Sync + std::fmt::Debug {
    fn map_to_target(&self, source: &Value) -> FireflyResult<Value>;
}

/// Immutable-after-construction index of mappers by target-class id.
#[derive(Debug, Default)]
pub struct MapperRegistry {
    mappers: HashMap<String, Arc<dyn Mapper>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mapper` under `target_id`. Refuses a duplicate id (§4.15
    /// "Registry must refuse duplicate target IDs at startup").
    pub fn register(&mut self, target_id: impl Into<String>, mapper: Arc<dyn Mapper>) -> FireflyResult<()> {
        let target_id = target_id.into();
        if self.mappers.contains_key(&target_id) {
            return Err(FireflyError::validation(format!(
                "duplicate mapper registered for target id '{target_id}'"
            )));
        }
        self.mappers.insert(target_id, mapper);
        Ok(())
    }

    pub fn get_mapper(&self, target_id: &str) -> Option<Arc<dyn Mapper>> {
        self.mappers.get(target_id).cloned()
    }
}

/// Built-in mapper that renames object keys per a fixed old→new mapping.
/// Source keys absent from the mapping are dropped (§4.15 targets a
/// specific DTO shape; unlike `FieldMapping` in the transformation chain,
/// unmapped keys do not pass through, since the output is a target DTO, not
/// an enriched superset of the source).
#[derive(Debug, Clone)]
pub struct FieldRenameMapper {
    rename: HashMap<String, String>,
}

impl FieldRenameMapper {
    pub fn new(rename: HashMap<String, String>) -> Self {
        Self { rename }
    }
}

impl Mapper for FieldRenameMapper {
    fn map_to_target(&self, source: &Value) -> FireflyResult<Value> {
        let Some(obj) = source.as_object() else {
            return Err(FireflyError::validation("mapper source must be a JSON object"));
        };
        let mut out = serde_json::Map::with_capacity(self.rename.len());
        for (source_key, target_key) in &self.rename {
            if let Some(value) = obj.get(source_key) {
                out.insert(target_key.clone(), value.clone());
            }
        }
        Ok(Value::Object(out))
    }
}
