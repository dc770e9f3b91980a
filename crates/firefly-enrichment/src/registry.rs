//! # Enricher Registry (§4.8)
//!
//! Built once at startup from a list of enricher instances, then immutable
//! (§5: "registry is immutable after startup; lookups are lock-free").
//! Indices are plain `HashMap`s built during construction; no `DashMap` is
//! needed since nothing mutates after `EnricherRegistry::new`.

use std::collections::HashMap;
use std::sync::Arc;

use firefly_shared::TenantId;

use crate::enricher::Enricher;
use crate::model::EnricherMetadata;
use firefly_shared::error::{FireflyError, FireflyResult};

fn lower(s: &str) -> String {
    s.to_lowercase()
}

/// Immutable, indexed collection of enrichers (§4.8).
pub struct EnricherRegistry {
    all: Vec<Arc<dyn Enricher>>,
    by_provider: HashMap<String, Vec<Arc<dyn Enricher>>>,
    by_tenant: HashMap<TenantId, Vec<Arc<dyn Enricher>>>,
    by_type: HashMap<String, Vec<Arc<dyn Enricher>>>,
    by_type_tenant: HashMap<(String, TenantId), Vec<Arc<dyn Enricher>>>,
    by_provider_tenant: HashMap<(String, TenantId), Arc<dyn Enricher>>,
    by_tag: HashMap<String, Vec<Arc<dyn Enricher>>>,
}

impl EnricherRegistry {
    /// Build the registry from a list of enrichers, skipping disabled
    /// entries and erroring on a duplicate `(providerName, tenantId)` pair.
    pub fn new(enrichers: Vec<Arc<dyn Enricher>>) -> FireflyResult<Self> {
        let mut all = Vec::new();
        let mut by_provider: HashMap<String, Vec<Arc<dyn Enricher>>> = HashMap::new();
        let mut by_tenant: HashMap<TenantId, Vec<Arc<dyn Enricher>>> = HashMap::new();
        let mut by_type: HashMap<String, Vec<Arc<dyn Enricher>>> = HashMap::new();
        let mut by_type_tenant: HashMap<(String, TenantId), Vec<Arc<dyn Enricher>>> = HashMap::new();
        let mut by_provider_tenant: HashMap<(String, TenantId), Arc<dyn Enricher>> = HashMap::new();
        let mut by_tag: HashMap<String, Vec<Arc<dyn Enricher>>> = HashMap::new();

        for enricher in enrichers {
            let meta = enricher.metadata();
            if !meta.enabled {
                continue;
            }
            meta.validate()?;

            let provider_key = lower(&meta.provider_name);
            let type_key = lower(&meta.r#type);

            let pt_key = (provider_key.clone(), meta.tenant_id);
            if by_provider_tenant.contains_key(&pt_key) {
                return Err(FireflyError::validation(format!(
                    "duplicate enricher for providerName='{}' tenantId='{}'",
                    meta.provider_name, meta.tenant_id
                )));
            }
            by_provider_tenant.insert(pt_key, enricher.clone());

            by_provider.entry(provider_key).or_default().push(enricher.clone());
            by_tenant.entry(meta.tenant_id).or_default().push(enricher.clone());
            by_type.entry(type_key.clone()).or_default().push(enricher.clone());
            by_type_tenant
                .entry((type_key, meta.tenant_id))
                .or_default()
                .push(enricher.clone());
            for tag in &meta.tags {
                by_tag.entry(lower(tag)).or_default().push(enricher.clone());
            }

            all.push(enricher);
        }

        // Sort every type-indexed bucket by priority descending, ties
        // broken by providerName ascending for a stable, deterministic
        // lookup order (§4.8).
        let sort_bucket = |bucket: &mut Vec<Arc<dyn Enricher>>| {
            bucket.sort_by(|a, b| {
                let ma = a.metadata();
                let mb = b.metadata();
                mb.priority
                    .cmp(&ma.priority)
                    .then_with(|| ma.provider_name.cmp(&mb.provider_name))
            });
        };
        for bucket in by_type.values_mut() {
            sort_bucket(bucket);
        }
        for bucket in by_type_tenant.values_mut() {
            sort_bucket(bucket);
        }

        Ok(Self {
            all,
            by_provider,
            by_tenant,
            by_type,
            by_type_tenant,
            by_provider_tenant,
            by_tag,
        })
    }

    pub fn all(&self) -> &[Arc<dyn Enricher>] {
        &self.all
    }

    pub fn by_provider_name(&self, provider_name: &str) -> &[Arc<dyn Enricher>] {
        self.by_provider
            .get(&lower(provider_name))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn by_tenant(&self, tenant_id: TenantId) -> &[Arc<dyn Enricher>] {
        self.by_tenant
            .get(&tenant_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Lookup by `(type, tenantId)`, sorted by priority descending, with
    /// tenant-fallback: an empty result for a non-global tenant retries
    /// against the global tenant (§4.8).
    pub fn by_type_and_tenant(&self, r#type: &str, tenant_id: TenantId) -> &[Arc<dyn Enricher>] {
        let key = (lower(r#type), tenant_id);
        match self.by_type_tenant.get(&key) {
            Some(v) if !v.is_empty() => v.as_slice(),
            _ if !tenant_id.is_global() => self
                .by_type_tenant
                .get(&(lower(r#type), TenantId::GLOBAL))
                .map(|v| v.as_slice())
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn by_provider_and_tenant(
        &self,
        provider_name: &str,
        tenant_id: TenantId,
    ) -> Option<&Arc<dyn Enricher>> {
        self.by_provider_tenant.get(&(lower(provider_name), tenant_id))
    }

    pub fn by_tag(&self, tag: &str) -> &[Arc<dyn Enricher>] {
        self.by_tag.get(&lower(tag)).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Select the highest-priority enabled enricher for `(type, tenantId)`,
    /// used by the smart dispatcher (§4.11).
    pub fn select(&self, r#type: &str, tenant_id: TenantId) -> Option<Arc<dyn Enricher>> {
        self.by_type_and_tenant(r#type, tenant_id).first().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enricher::test_support::StubEnricher;

    fn registry_with(enrichers: Vec<Arc<dyn Enricher>>) -> EnricherRegistry {
        EnricherRegistry::new(enrichers).expect("registry builds")
    }

    #[test]
    fn select_returns_highest_priority_enricher() {
        let low = StubEnricher::new("low-pri", "credit-report", 10, TenantId::GLOBAL);
        let high = StubEnricher::new("high-pri", "credit-report", 90, TenantId::GLOBAL);
        let registry = registry_with(vec![Arc::new(low), Arc::new(high)]);
        let selected = registry.select("credit-report", TenantId::GLOBAL).unwrap();
        assert_eq!(selected.metadata().provider_name, "high-pri");
    }

    #[test]
    fn ties_break_by_provider_name_ascending() {
        let b = StubEnricher::new("bravo", "credit-report", 50, TenantId::GLOBAL);
        let a = StubEnricher::new("alpha", "credit-report", 50, TenantId::GLOBAL);
        let registry = registry_with(vec![Arc::new(b), Arc::new(a)]);
        let bucket = registry.by_type_and_tenant("credit-report", TenantId::GLOBAL);
        assert_eq!(bucket[0].metadata().provider_name, "alpha");
    }

    #[test]
    fn disabled_enrichers_are_skipped() {
        let mut disabled = StubEnricher::new("off", "credit-report", 100, TenantId::GLOBAL);
        disabled.metadata.enabled = false;
        let registry = registry_with(vec![Arc::new(disabled)]);
        assert!(registry.select("credit-report", TenantId::GLOBAL).is_none());
    }

    #[test]
    fn duplicate_provider_tenant_pair_is_rejected() {
        let a = StubEnricher::new("dup", "credit-report", 10, TenantId::GLOBAL);
        let b = StubEnricher::new("dup", "background-check", 20, TenantId::GLOBAL);
        let result = EnricherRegistry::new(vec![Arc::new(a), Arc::new(b)]);
        assert!(result.is_err());
    }

    #[test]
    fn tenant_fallback_returns_global_when_tenant_specific_is_empty() {
        let tenant = TenantId::from(uuid::Uuid::new_v4());
        let global = StubEnricher::new("global-provider", "credit-report", 50, TenantId::GLOBAL);
        let registry = registry_with(vec![Arc::new(global)]);
        let bucket = registry.by_type_and_tenant("credit-report", tenant);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].metadata().provider_name, "global-provider");
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let e = StubEnricher::new("Acme", "Credit-Report", 50, TenantId::GLOBAL);
        let registry = registry_with(vec![Arc::new(e)]);
        assert!(registry.select("credit-report", TenantId::GLOBAL).is_some());
        assert!(!registry.by_provider_name("acme").is_empty());
    }
}
