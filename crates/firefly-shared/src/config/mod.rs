//! # Core Configuration (§6, AMBIENT)
//!
//! `CoreConfig` mirrors the single configuration namespace from §6 exactly,
//! with the same defaults. Loading it from files/env is the host's
//! responsibility (via the `config` crate's `Config::builder()`); this
//! module only defines the typed tree and its defaults, matching the
//! pattern of nested `#[derive(Default, Deserialize, Serialize)]` config
//! structs used throughout the codebase's own configuration layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn duration_secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// Root configuration tree for the enrichment and job-lifecycle cores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub enrichment: EnrichmentConfig,
    pub operations: OperationsConfig,
    pub resiliency: ResiliencySettings,
    pub quality: QualityConfig,
    pub lineage: LineageConfig,
    pub discovery: DiscoveryConfig,
    pub orchestration: OrchestrationObservabilityWrapper,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            enrichment: EnrichmentConfig::default(),
            operations: OperationsConfig::default(),
            resiliency: ResiliencySettings::default(),
            quality: QualityConfig::default(),
            lineage: LineageConfig::default(),
            discovery: DiscoveryConfig::default(),
            orchestration: OrchestrationObservabilityWrapper::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub publish_events: bool,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
    pub default_timeout_seconds: u64,
    pub max_batch_size: usize,
    pub batch_parallelism: usize,
    pub batch_fail_fast: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            publish_events: true,
            cache_enabled: false,
            cache_ttl_seconds: 3600,
            default_timeout_seconds: 30,
            max_batch_size: 100,
            batch_parallelism: 10,
            batch_fail_fast: false,
        }
    }
}

impl EnrichmentConfig {
    pub fn default_timeout(&self) -> Duration {
        duration_secs(self.default_timeout_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        duration_secs(self.cache_ttl_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationsConfig {
    pub observability_enabled: bool,
    pub resiliency_enabled: bool,
    pub cache_enabled: bool,
    pub validation_enabled: bool,
    pub publish_events: bool,
    pub default_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            observability_enabled: true,
            resiliency_enabled: true,
            cache_enabled: true,
            validation_enabled: true,
            publish_events: true,
            default_timeout_seconds: 15,
            cache_ttl_seconds: 1800,
        }
    }
}

impl OperationsConfig {
    pub fn default_timeout(&self) -> Duration {
        duration_secs(self.default_timeout_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        duration_secs(self.cache_ttl_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration_threshold_seconds: u64,
    pub wait_duration_in_open_state_seconds: u64,
    pub permitted_in_half_open: usize,
    pub sliding_window_size: usize,
    pub minimum_number_of_calls: usize,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration_threshold_seconds: 60,
            wait_duration_in_open_state_seconds: 60,
            permitted_in_half_open: 10,
            sliding_window_size: 100,
            minimum_number_of_calls: 10,
        }
    }
}

impl From<&CircuitBreakerSettings> for crate::resilience::CircuitBreakerConfig {
    fn from(s: &CircuitBreakerSettings) -> Self {
        Self {
            failure_rate_threshold: s.failure_rate_threshold,
            slow_call_rate_threshold: s.slow_call_rate_threshold,
            slow_call_duration_threshold: duration_secs(s.slow_call_duration_threshold_seconds),
            wait_duration_in_open_state: duration_secs(s.wait_duration_in_open_state_seconds),
            permitted_number_of_calls_in_half_open_state: s.permitted_in_half_open,
            sliding_window_size: s.sliding_window_size,
            minimum_number_of_calls: s.minimum_number_of_calls,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub wait_duration_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_duration_seconds: 5,
        }
    }
}

impl From<&RetrySettings> for crate::resilience::RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts,
            initial_backoff: duration_secs(s.wait_duration_seconds),
            max_backoff: duration_secs(s.wait_duration_seconds),
            backoff_multiplier: 1.0,
            jitter_factor: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterSettings {
    pub limit_for_period: f64,
    pub limit_refresh_period_seconds: u64,
    pub timeout_duration_seconds: u64,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            limit_for_period: 100.0,
            limit_refresh_period_seconds: 1,
            timeout_duration_seconds: 5,
        }
    }
}

impl From<&RateLimiterSettings> for crate::resilience::RateLimiterConfig {
    fn from(s: &RateLimiterSettings) -> Self {
        let period = s.limit_refresh_period_seconds.max(1) as f64;
        Self {
            capacity: s.limit_for_period,
            refill_per_second: s.limit_for_period / period,
            max_wait: duration_secs(s.timeout_duration_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadSettings {
    pub max_concurrent_calls: usize,
    pub max_wait_duration_millis: u64,
}

impl Default for BulkheadSettings {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_wait_duration_millis: 500,
        }
    }
}

impl From<&BulkheadSettings> for crate::resilience::BulkheadConfig {
    fn from(s: &BulkheadSettings) -> Self {
        Self {
            max_concurrent_calls: s.max_concurrent_calls,
            max_wait: Duration::from_millis(s.max_wait_duration_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResiliencySettings {
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    pub rate_limiter: RateLimiterSettings,
    pub bulkhead: BulkheadSettings,
}

impl Default for ResiliencySettings {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerSettings::default(),
            retry: RetrySettings::default(),
            rate_limiter: RateLimiterSettings::default(),
            bulkhead: BulkheadSettings::default(),
        }
    }
}

impl ResiliencySettings {
    /// Build the runtime `ResiliencyConfig` consumed by
    /// [`crate::resilience::ResiliencyDecorator`], with the timeout taken
    /// from the caller's own default-timeout setting since §6 keeps
    /// per-call timeouts with `enrichment`/`operations`, not `resiliency`.
    pub fn to_runtime_config(&self, timeout: Duration) -> crate::resilience::ResiliencyConfig {
        crate::resilience::ResiliencyConfig {
            circuit_breaker: (&self.circuit_breaker).into(),
            retry: (&self.retry).into(),
            rate_limiter: (&self.rate_limiter).into(),
            bulkhead: (&self.bulkhead).into(),
            timeout: crate::resilience::TimeoutConfig { duration: timeout },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub enabled: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    pub enabled: bool,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub tracing_enabled: bool,
    pub metrics_enabled: bool,
    pub metric_prefix: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            tracing_enabled: true,
            metrics_enabled: true,
            metric_prefix: "firefly.data.job".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    pub audit_enabled: bool,
    pub result_persistence_enabled: bool,
    pub audit_retention_days: u32,
    pub result_retention_days: u32,
    pub enable_result_caching: bool,
    pub result_cache_ttl_seconds: u64,
    pub max_data_size_bytes: u64,
    pub sanitize_sensitive_data: bool,
    pub excluded_parameter_keys: String,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            result_persistence_enabled: true,
            audit_retention_days: 90,
            result_retention_days: 30,
            enable_result_caching: true,
            result_cache_ttl_seconds: 3600,
            max_data_size_bytes: 10_485_760,
            sanitize_sensitive_data: true,
            excluded_parameter_keys: "password,secret,token,apiKey,authorization".to_string(),
        }
    }
}

impl PersistenceSettings {
    /// The excluded-parameter-keys list, split and trimmed.
    pub fn excluded_parameter_key_list(&self) -> Vec<String> {
        self.excluded_parameter_keys
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationObservabilityWrapper {
    pub observability: ObservabilitySettings,
    pub persistence: PersistenceSettings,
}

impl Default for OrchestrationObservabilityWrapper {
    fn default() -> Self {
        Self {
            observability: ObservabilitySettings::default(),
            persistence: PersistenceSettings::default(),
        }
    }
}
