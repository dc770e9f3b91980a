//! # Canonicalization + Content Hashing
//!
//! Backs two independently specified needs with one routine: cache-key
//! derivation (§4.3) and lineage `inputHash`/`outputHash` (§4.9 step 8).
//! Both need a stable string representation of a JSON value — lexically
//! sorted object keys, stable array order — hashed with SHA-256.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render a JSON value with lexicographically sorted object keys and
/// unmodified array order, so structurally identical values always produce
/// the same string regardless of field insertion order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (i, (k, v)) in sorted.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(k).expect("string key always serializes"));
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Canonicalize a serializable map-like value and hash it with SHA-256,
/// returning the lowercase hex digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the §4.3 cache key:
/// `sha256("enr:" + type + ":" + tenantIdOrGlobal + ":" + canonical(sourceData)
///          + ":" + canonical(parameters) + ":" + strategy)`
pub fn cache_key(
    type_name: &str,
    tenant: &str,
    source_data: &Value,
    parameters: &Value,
    strategy: &str,
) -> String {
    let raw = format!(
        "enr:{}:{}:{}:{}:{}",
        type_name,
        tenant,
        canonical_json(source_data),
        canonical_json(parameters),
        strategy
    );
    sha256_hex(&raw)
}

/// Hash an arbitrary JSON-serializable payload for lineage provenance.
pub fn content_hash(value: &Value) -> String {
    sha256_hex(&canonical_json(value))
}

/// UTF-8 byte length of a value's JSON serialization, used for
/// `JobExecutionResult::dataSizeBytes` and cost-tracking byte counters.
pub fn utf8_json_len(value: &Value) -> usize {
    serde_json::to_string(value)
        .map(|s| s.len())
        .unwrap_or(0)
}
