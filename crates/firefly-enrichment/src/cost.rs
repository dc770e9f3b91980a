//! # Cost Tracker (§2.7, §4.7)
//!
//! Thread-safe per-provider / per-type call and byte counters, backed by
//! `dashmap` so concurrent recorders never block each other across distinct
//! keys. Snapshots are consistent per invocation but independent across
//! invocations (§4.7) — no attempt is made to correlate a snapshot with any
//! particular point-in-time cutoff beyond "as of this call".

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Counter {
    calls: AtomicU64,
    bytes: AtomicU64,
}

impl Counter {
    fn record(&self, bytes: u64) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CallBytes {
        CallBytes {
            calls: self.calls.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct CallBytes {
    pub calls: u64,
    pub bytes: u64,
}

/// Per-provider/per-type call and byte counters (§4.7).
#[derive(Debug, Default)]
pub struct CostTracker {
    per_provider: DashMap<String, Counter>,
    per_type: DashMap<String, Counter>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self, provider: &str, type_name: &str, bytes: u64) {
        self.per_provider.entry(provider.to_string()).or_default().record(bytes);
        self.per_type.entry(type_name.to_string()).or_default().record(bytes);
    }

    pub fn snapshot(&self) -> CostReport {
        let per_provider = self
            .per_provider
            .iter()
            .map(|e| (e.key().clone(), e.value().snapshot()))
            .collect();
        let per_type = self
            .per_type
            .iter()
            .map(|e| (e.key().clone(), e.value().snapshot()))
            .collect();
        let totals = self
            .per_provider
            .iter()
            .fold(CallBytes::default(), |mut acc, e| {
                let s = e.value().snapshot();
                acc.calls += s.calls;
                acc.bytes += s.bytes;
                acc
            });
        CostReport {
            per_provider,
            per_type,
            totals,
        }
    }
}

/// Snapshot report returned by [`CostTracker::snapshot`] and the §4.13
/// `costReport` discovery handler.
#[derive(Debug, Clone, Serialize)]
pub struct CostReport {
    pub per_provider: std::collections::HashMap<String, CallBytes>,
    pub per_type: std::collections::HashMap<String, CallBytes>,
    pub totals: CallBytes,
}
