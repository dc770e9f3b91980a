//! # Strategy Merge (§4.9 step 7, §8)
//!
//! Combines caller-supplied `sourceData` with provider-mapped `target` data
//! under one of the four merge strategies. Pure and synchronous: no I/O, no
//! enricher-specific knowledge, so it is trivially unit-testable against the
//! exact S1/S2 scenarios in spec §8.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::MergeStrategy;

/// Apply `strategy` to combine `source` and `target`, returning the merged
/// map and the count of fields whose value differs from `source` (§4.9:
/// `fieldsEnriched`).
pub fn apply(
    source: &HashMap<String, Value>,
    target: &HashMap<String, Value>,
    strategy: MergeStrategy,
) -> (HashMap<String, Value>, u32) {
    let merged = match strategy {
        MergeStrategy::Enhance => enhance(source, target),
        MergeStrategy::Merge => merge(source, target),
        MergeStrategy::Replace | MergeStrategy::Raw => target.clone(),
    };
    let fields_enriched = merged
        .iter()
        .filter(|(k, v)| source.get(*k) != Some(*v))
        .count() as u32;
    (merged, fields_enriched)
}

/// ENHANCE: for each key in target not already set to a non-null value in
/// source, insert it. Source wins on conflict.
fn enhance(source: &HashMap<String, Value>, target: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut out = source.clone();
    for (key, value) in target {
        let source_has_non_null = out.get(key).map(|v| !v.is_null()).unwrap_or(false);
        if !source_has_non_null {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// MERGE: union of both maps; target wins on conflict, except a null target
/// value never overwrites a non-null source value.
fn merge(source: &HashMap<String, Value>, target: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut out = source.clone();
    for (key, value) in target {
        let source_is_non_null = out.get(key).map(|v| !v.is_null()).unwrap_or(false);
        if source_is_non_null && value.is_null() {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }
    out
}
