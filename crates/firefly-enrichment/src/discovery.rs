//! # Discovery / Health / Cost handlers (§2.13, §4.13)
//!
//! Read-only views over the registry (§4.8) and cost tracker (§4.7). None of
//! these mutate state; `health` is the only one that performs I/O, by
//! polling each matched enricher's liveness probe.

use std::time::Duration;

use serde::Serialize;

use firefly_shared::TenantId;

use crate::cost::CostReport;
use crate::operations::OperationMetadata;
use crate::registry::EnricherRegistry;

/// One entry of `listProviders` (§4.13).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub provider_name: String,
    pub r#type: String,
    pub tenant_id: TenantId,
    pub description: String,
    pub priority: i32,
    pub operations: Vec<OperationMetadata>,
}

/// Aggregate health status returned by `health()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: AggregateStatus,
    pub details: std::collections::HashMap<String, bool>,
}

/// Read-only discovery/health/cost surface over a registry + cost tracker.
pub struct DiscoveryService {
    registry: std::sync::Arc<EnricherRegistry>,
    cost: std::sync::Arc<crate::cost::CostTracker>,
    health_timeout: Duration,
}

impl DiscoveryService {
    pub fn new(
        registry: std::sync::Arc<EnricherRegistry>,
        cost: std::sync::Arc<crate::cost::CostTracker>,
        health_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            cost,
            health_timeout,
        }
    }

    /// `listProviders(typeFilter?)` (§4.13).
    pub fn list_providers(&self, type_filter: Option<&str>) -> Vec<ProviderInfo> {
        self.registry
            .all()
            .iter()
            .filter(|e| {
                type_filter
                    .map(|t| e.metadata().r#type.eq_ignore_ascii_case(t))
                    .unwrap_or(true)
            })
            .map(|e| {
                let meta = e.metadata();
                ProviderInfo {
                    provider_name: meta.provider_name.clone(),
                    r#type: meta.r#type.clone(),
                    tenant_id: meta.tenant_id,
                    description: meta.description.clone(),
                    priority: meta.priority,
                    operations: e.operations(),
                }
            })
            .collect()
    }

    /// `health(typeFilter?)`: UP iff every matched enricher's probe returns
    /// UP within `health_timeout`, DOWN otherwise.
    pub async fn health(&self, type_filter: Option<&str>) -> HealthReport {
        let matched: Vec<_> = self
            .registry
            .all()
            .iter()
            .filter(|e| {
                type_filter
                    .map(|t| e.metadata().r#type.eq_ignore_ascii_case(t))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        let mut details = std::collections::HashMap::new();
        for enricher in &matched {
            let probe = tokio::time::timeout(self.health_timeout, enricher.health()).await;
            let healthy = probe.unwrap_or(false);
            details.insert(enricher.metadata().provider_name.clone(), healthy);
        }

        let status = if details.values().all(|ok| *ok) {
            AggregateStatus::Up
        } else {
            AggregateStatus::Down
        };
        HealthReport { status, details }
    }

    /// `costReport()` (§4.13, §4.7).
    pub fn cost_report(&self) -> CostReport {
        self.cost.snapshot()
    }
}
