//! # Cache Port + Keying (§4.3)
//!
//! `CacheAdapter` is the port consumed by the enrichment pipeline's cache
//! lookup/put steps. The default implementation is an in-process `moka`
//! TTL cache; a `NoopCache` is provided for when `cache-enabled=false`, and
//! the absence of an adapter (the port is `Option<Arc<dyn CacheAdapter>>`
//! at call sites) is equally valid — §4.3 treats "no port" and "disabled"
//! identically.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;

use crate::error::FireflyResult;

/// Cache port consumed by the enrichment and operation dispatch pipelines.
#[async_trait]
pub trait CacheAdapter: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> FireflyResult<Option<Value>>;
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> FireflyResult<()>;
    async fn delete(&self, key: &str) -> FireflyResult<()>;
}

/// In-process TTL cache backed by `moka`. TTL is per-entry via
/// `moka`'s expiration policy configured at construction time; since moka's
/// `future::Cache` supports only a single uniform `time_to_live`, entries
/// requesting a longer TTL than the cache's configured ceiling are still
/// capped at that ceiling.
#[derive(Debug)]
pub struct MokaCacheAdapter {
    inner: Cache<String, Value>,
}

impl MokaCacheAdapter {
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(default_ttl)
                .build(),
        }
    }
}

#[async_trait]
impl CacheAdapter for MokaCacheAdapter {
    async fn get(&self, key: &str) -> FireflyResult<Option<Value>> {
        Ok(self.inner.get(key).await)
    }

    async fn put(&self, key: &str, value: Value, _ttl: Duration) -> FireflyResult<()> {
        self.inner.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> FireflyResult<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

/// Cache adapter that never stores anything; equivalent to the absence of
/// a cache port, used when `cache-enabled=false`.
#[derive(Debug, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheAdapter for NoopCache {
    async fn get(&self, _key: &str) -> FireflyResult<Option<Value>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: Value, _ttl: Duration) -> FireflyResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> FireflyResult<()> {
        Ok(())
    }
}
