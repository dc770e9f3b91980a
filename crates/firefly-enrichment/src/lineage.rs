//! # Lineage Tracker (§2.6, §4.6)
//!
//! Records per-operation provenance entries and answers queries by entity
//! or operator. The in-memory default uses copy-on-write semantics: writers
//! append under a per-entity lock, readers get a cloned snapshot slice with
//! no cross-record transactional guarantees (§4.6, §5).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use firefly_shared::error::FireflyResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineageOperation {
    Enrichment,
    Transformation,
    JobCollection,
    Custom,
}

/// An immutable provenance entry linking an entity through an operation to
/// its producer, with content hashes (§3 `LineageRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageRecord {
    pub record_id: Uuid,
    pub entity_id: String,
    pub source_system: String,
    pub operation: LineageOperation,
    pub operator_id: String,
    pub timestamp: DateTime<Utc>,
    pub input_hash: String,
    pub output_hash: String,
    pub trace_id: Option<String>,
    pub metadata: Option<Value>,
}

impl LineageRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entity_id: impl Into<String>,
        source_system: impl Into<String>,
        operation: LineageOperation,
        operator_id: impl Into<String>,
        input_hash: impl Into<String>,
        output_hash: impl Into<String>,
        trace_id: Option<String>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            entity_id: entity_id.into(),
            source_system: source_system.into(),
            operation,
            operator_id: operator_id.into(),
            timestamp: Utc::now(),
            input_hash: input_hash.into(),
            output_hash: output_hash.into(),
            trace_id,
            metadata: None,
        }
    }
}

/// Lineage tracker port (§4.6, §6).
#[async_trait]
pub trait LineageTracker: Send + Sync + std::fmt::Debug {
    async fn record(&self, record: LineageRecord) -> FireflyResult<()>;
    async fn get_lineage(&self, entity_id: &str) -> FireflyResult<Vec<LineageRecord>>;
    async fn get_lineage_by_operator(&self, operator_id: &str) -> FireflyResult<Vec<LineageRecord>>;
}

/// Development default: one append-only list per entity. Reads take a read
/// lock just long enough to clone the relevant slice — a snapshot, not a
/// live view — matching §4.6's "all reads are snapshots" contract.
///
/// Advise callers against enabling this in production without external
/// retention; it grows without bound (§9 redesign flag).
#[derive(Debug, Default)]
pub struct InMemoryLineageTracker {
    by_entity: RwLock<HashMap<String, Vec<LineageRecord>>>,
}

impl InMemoryLineageTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LineageTracker for InMemoryLineageTracker {
    async fn record(&self, record: LineageRecord) -> FireflyResult<()> {
        let mut guard = self.by_entity.write().expect("lineage store lock poisoned");
        guard.entry(record.entity_id.clone()).or_default().push(record);
        Ok(())
    }

    async fn get_lineage(&self, entity_id: &str) -> FireflyResult<Vec<LineageRecord>> {
        let guard = self.by_entity.read().expect("lineage store lock poisoned");
        Ok(guard.get(entity_id).cloned().unwrap_or_default())
    }

    async fn get_lineage_by_operator(&self, operator_id: &str) -> FireflyResult<Vec<LineageRecord>> {
        let guard = self.by_entity.read().expect("lineage store lock poisoned");
        Ok(guard
            .values()
            .flatten()
            .filter(|r| r.operator_id == operator_id)
            .cloned()
            .collect())
    }
}
