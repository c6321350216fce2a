//! Cache-aside store with per-entry TTL (L1: Moka in-memory, L2: optional Redis)
//!
//! - L1: bounded Moka cache, local to the process; each entry carries its own TTL
//! - L2: Redis, shared between instances when configured
//!
//! The cache is best-effort: no operation returns an error. Storage and
//! decoding failures are logged, counted and reported as a miss.

use moka::Expiry;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::KeyBuilder;
use crate::config::Config;
use crate::metrics::cache::CACHE_ERRORS;

/// TTL of the sentinel written by [`TtlCache::health_check`]
const HEALTH_SENTINEL_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<str>,
    ttl: Duration,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(payload: String, ttl: Duration) -> Self {
        Self {
            payload: payload.into(),
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Evicts each entry after its own TTL, restarting on overwrite
struct PerEntryExpiry;

impl Expiry<String, CacheEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Liveness report for the health surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub healthy: bool,
    pub l1_healthy: bool,
    /// `None` when Redis is not configured
    pub l2_healthy: Option<bool>,
    pub redis_enabled: bool,
    pub entry_count: u64,
}

/// Shared cache used by every resolver
#[derive(Clone)]
pub struct TtlCache {
    l1: moka::future::Cache<String, CacheEntry>,
    redis: Option<ConnectionManager>,
    redis_timeout: Duration,
    keys: KeyBuilder,
    default_ttl: Duration,
}

impl TtlCache {
    /// Create a new cache
    ///
    /// # Arguments
    /// * `redis` - Optional Redis connection. If None, only L1 caching is used.
    /// * `max_capacity` - Maximum number of entries in L1
    /// * `default_ttl` - TTL applied when `set` is called without one
    /// * `redis_timeout` - Upper bound for every Redis operation
    /// * `keys` - Key builder (supplies the prefix for sentinels and `clear`)
    #[must_use]
    pub fn new(
        redis: Option<ConnectionManager>,
        max_capacity: u64,
        default_ttl: Duration,
        redis_timeout: Duration,
        keys: KeyBuilder,
    ) -> Self {
        let l1 = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .build();

        Self {
            l1,
            redis,
            redis_timeout,
            keys,
            default_ttl,
        }
    }

    /// L1-only cache configured from `Config`
    #[must_use]
    pub fn from_config(config: &Config, redis: Option<ConnectionManager>) -> Self {
        Self::new(
            redis,
            config.cache.max_capacity,
            config.cache.default_ttl(),
            Duration::from_millis(config.redis.operation_timeout_ms),
            KeyBuilder::from_config(config),
        )
    }

    #[must_use]
    pub const fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    #[must_use]
    pub const fn redis_enabled(&self) -> bool {
        self.redis.is_some()
    }

    /// Value stored under `key`, if present and unexpired
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache_type = cache_type(key);

        if let Some(entry) = self.l1.get(key).await {
            if entry.is_live() {
                if let Some(value) = self.decode(key, &entry.payload).await {
                    crate::record_cache_hit!(cache_type, "l1");
                    tracing::debug!(key, "Cache hit (L1)");
                    return Some(value);
                }
            } else {
                self.l1.invalidate(key).await;
            }
        }

        let owned_key = key.to_string();
        let l2 = self
            .with_redis("get", move |mut conn| async move {
                let (payload, pttl): (Option<String>, i64) = redis::pipe()
                    .get(&owned_key)
                    .pttl(&owned_key)
                    .query_async(&mut conn)
                    .await?;
                Ok(payload.map(|p| (p, pttl)))
            })
            .await
            .flatten();

        if let Some((payload, pttl)) = l2 {
            if let Some(value) = self.decode(key, &payload).await {
                // Back-fill L1 with whatever lifetime Redis has left
                let remaining = u64::try_from(pttl).map_or(self.default_ttl, Duration::from_millis);
                if !remaining.is_zero() {
                    self.l1
                        .insert(key.to_string(), CacheEntry::new(payload, remaining))
                        .await;
                }
                crate::record_cache_hit!(cache_type, "l2");
                tracing::debug!(key, "Cache hit (L2)");
                return Some(value);
            }
        }

        crate::record_cache_miss!(cache_type);
        tracing::debug!(key, "Cache miss");
        None
    }

    /// Store `value` for `ttl` (or the default TTL)
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            tracing::debug!(key, "Skipping cache write with zero TTL");
            return;
        }

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize value for caching");
                CACHE_ERRORS.with_label_values(&["l1", "serialize"]).inc();
                return;
            }
        };

        self.l1
            .insert(key.to_string(), CacheEntry::new(payload.clone(), ttl))
            .await;

        let owned_key = key.to_string();
        // Millisecond expiry so L2 never outlives L1; at least 1 ms since 0 is rejected
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        self.with_redis("set", move |mut conn| async move {
            conn.pset_ex::<_, _, ()>(&owned_key, payload, ttl_ms).await
        })
        .await;

        tracing::debug!(key, ttl_ms, "Value cached");
    }

    pub async fn delete(&self, key: &str) {
        self.l1.invalidate(key).await;

        let owned_key = key.to_string();
        self.with_redis("delete", move |mut conn| async move {
            conn.del::<_, ()>(&owned_key).await
        })
        .await;
    }

    /// Remove every entry: all of L1 and every L2 key under the prefix
    pub async fn clear(&self) {
        self.l1.invalidate_all();

        let pattern = self.keys.pattern_all();
        let removed = self
            .with_redis("clear", move |mut conn| async move {
                let mut cursor: u64 = 0;
                let mut removed = 0usize;
                loop {
                    let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(500)
                        .query_async(&mut conn)
                        .await?;
                    if !keys.is_empty() {
                        removed += keys.len();
                        conn.del::<_, ()>(keys).await?;
                    }
                    if next == 0 {
                        return Ok(removed);
                    }
                    cursor = next;
                }
            })
            .await;

        tracing::info!(l2_removed = removed.unwrap_or(0), "Cache cleared");
    }

    /// Write a sentinel, read it back, delete it
    pub async fn health_check(&self) -> bool {
        self.health().await.healthy
    }

    /// Detailed health report (L1 round trip, plus L2 when configured)
    pub async fn health(&self) -> CacheHealth {
        let nonce = uuid::Uuid::new_v4().to_string();
        let key = self.keys.health_sentinel(&nonce);

        self.l1
            .insert(key.clone(), CacheEntry::new(serde_json::json!(nonce).to_string(), HEALTH_SENTINEL_TTL))
            .await;
        let l1_healthy = self
            .l1
            .get(&key)
            .await
            .and_then(|entry| serde_json::from_str::<String>(&entry.payload).ok())
            .is_some_and(|read| read == nonce);
        self.l1.invalidate(&key).await;

        let l2_healthy = if self.redis_enabled() {
            let owned_key = key.clone();
            let expected = nonce.clone();
            let ttl_secs = HEALTH_SENTINEL_TTL.as_secs();
            let read = self
                .with_redis("health", move |mut conn| async move {
                    conn.set_ex::<_, _, ()>(&owned_key, &expected, ttl_secs).await?;
                    let read: Option<String> = conn.get(&owned_key).await?;
                    conn.del::<_, ()>(&owned_key).await?;
                    Ok(read)
                })
                .await
                .flatten();
            Some(read.is_some_and(|read| read == nonce))
        } else {
            None
        };

        self.l1.run_pending_tasks().await;
        CacheHealth {
            healthy: l1_healthy && l2_healthy.unwrap_or(true),
            l1_healthy,
            l2_healthy,
            redis_enabled: self.redis_enabled(),
            entry_count: self.l1.entry_count(),
        }
    }

    /// Approximate number of L1 entries
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.l1.entry_count()
    }

    async fn decode<T: DeserializeOwned>(&self, key: &str, payload: &str) -> Option<T> {
        match serde_json::from_str(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                CACHE_ERRORS.with_label_values(&["l1", "decode"]).inc();
                self.l1.invalidate(key).await;
                None
            }
        }
    }

    /// Run a Redis operation with the configured timeout, absorbing every failure
    async fn with_redis<T, F, Fut>(&self, operation: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.redis.clone()?;
        match tokio::time::timeout(self.redis_timeout, f(conn)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(operation, error = %e, "Redis cache operation failed");
                CACHE_ERRORS.with_label_values(&["l2", operation]).inc();
                None
            }
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.redis_timeout.as_millis(),
                    "Redis cache operation timed out"
                );
                CACHE_ERRORS.with_label_values(&["l2", operation]).inc();
                None
            }
        }
    }
}

/// Metrics label: the namespace segment after the prefix (`stock`, `geo`, ...)
fn cache_type(key: &str) -> &str {
    key.split(':').nth(1).unwrap_or("other")
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("redis_enabled", &self.redis.is_some())
            .field("default_ttl", &self.default_ttl)
            .field("prefix", &self.keys.prefix())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductId, ProductRecord};

    fn cache() -> TtlCache {
        TtlCache::new(
            None,
            100,
            Duration::from_secs(60),
            Duration::from_millis(100),
            KeyBuilder::new("test"),
        )
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = cache();
        let key = cache.keys().product(&ProductId::from("p1"));
        let product = ProductRecord::unavailable(ProductId::from("p1"));

        assert!(cache.get::<ProductRecord>(&key).await.is_none());

        cache.set(&key, &product, None).await;
        assert_eq!(cache.get::<ProductRecord>(&key).await, Some(product));

        cache.delete(&key).await;
        assert!(cache.get::<ProductRecord>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = cache();
        cache.set("test:geo:distance:a:b", &12.5_f64, Some(Duration::from_millis(300))).await;

        assert_eq!(cache.get::<f64>("test:geo:distance:a:b").await, Some(12.5));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.get::<f64>("test:geo:distance:a:b").await, None);
    }

    #[tokio::test]
    async fn test_independent_ttls() {
        let cache = cache();
        cache.set("test:stock:product:1", &"short", Some(Duration::from_millis(200))).await;
        cache.set("test:geo:distance:1:2", &"long", Some(Duration::from_secs(60))).await;

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(cache.get::<String>("test:stock:product:1").await, None);
        assert_eq!(cache.get::<String>("test:geo:distance:1:2").await.as_deref(), Some("long"));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_ttl() {
        let cache = cache();
        cache.set("test:k", &1, Some(Duration::from_millis(200))).await;
        cache.set("test:k", &2, Some(Duration::from_secs(60))).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.get::<i32>("test:k").await, Some(2));
    }

    #[tokio::test]
    async fn test_decode_failure_is_a_miss() {
        let cache = cache();
        cache.set("test:k", &"not a number", None).await;

        assert_eq!(cache.get::<f64>("test:k").await, None);
        // The bad entry was discarded
        assert_eq!(cache.get::<String>("test:k").await, None);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let cache = cache();
        cache.set("test:k", &1, Some(Duration::ZERO)).await;
        assert_eq!(cache.get::<i32>("test:k").await, None);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache();
        cache.set("test:a", &1, None).await;
        cache.set("test:b", &2, None).await;

        cache.clear().await;

        assert_eq!(cache.get::<i32>("test:a").await, None);
        assert_eq!(cache.get::<i32>("test:b").await, None);
    }

    #[tokio::test]
    async fn test_health_check_l1_only() {
        let cache = cache();
        cache.set("test:a", &1, None).await;

        let health = cache.health().await;
        assert!(health.healthy);
        assert!(health.l1_healthy);
        assert_eq!(health.l2_healthy, None);
        assert!(!health.redis_enabled);
        // The sentinel is gone again
        assert_eq!(health.entry_count, 1);
        assert!(cache.health_check().await);
    }

    /// Redis-backed cache under a throwaway prefix; `None` when `REDIS_URL` is unset
    async fn redis_cache(prefix: &str, redis_timeout: Duration) -> Option<TtlCache> {
        let url = std::env::var("REDIS_URL").ok()?;
        let client = redis::Client::open(url).unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        Some(TtlCache::new(
            Some(conn),
            100,
            Duration::from_secs(60),
            redis_timeout,
            KeyBuilder::new(prefix),
        ))
    }

    fn unique_prefix() -> String {
        format!("freightline-test-{}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_redis_hit_back_fills_a_cold_l1() {
        let prefix = unique_prefix();
        let Some(writer) = redis_cache(&prefix, Duration::from_secs(2)).await else {
            return;
        };
        let reader = redis_cache(&prefix, Duration::from_secs(2)).await.unwrap();
        let key = writer.keys().distance("1000", "2000");

        writer.set(&key, &42.5_f64, Some(Duration::from_secs(30))).await;

        assert!(!reader.l1.contains_key(&key));
        assert_eq!(reader.get::<f64>(&key).await, Some(42.5));
        assert!(reader.l1.contains_key(&key));

        writer.clear().await;
    }

    #[tokio::test]
    async fn test_redis_honours_sub_second_ttl() {
        let prefix = unique_prefix();
        let Some(writer) = redis_cache(&prefix, Duration::from_secs(2)).await else {
            return;
        };
        let reader = redis_cache(&prefix, Duration::from_secs(2)).await.unwrap();
        let key = writer.keys().distance("1000", "3000");

        writer.set(&key, &7.0_f64, Some(Duration::from_millis(300))).await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(reader.get::<f64>(&key).await, None);
    }

    #[tokio::test]
    async fn test_redis_clear_removes_prefixed_keys_only() {
        let prefix = unique_prefix();
        let Some(cache) = redis_cache(&prefix, Duration::from_secs(2)).await else {
            return;
        };
        let neighbour = redis_cache(&unique_prefix(), Duration::from_secs(2)).await.unwrap();
        let a = cache.keys().product(&ProductId::from("a"));
        let b = cache.keys().product(&ProductId::from("b"));
        let other = neighbour.keys().product(&ProductId::from("a"));

        cache.set(&a, &1, None).await;
        cache.set(&b, &2, None).await;
        neighbour.set(&other, &3, None).await;

        cache.clear().await;

        let cold = redis_cache(&prefix, Duration::from_secs(2)).await.unwrap();
        assert_eq!(cold.get::<i32>(&a).await, None);
        assert_eq!(cold.get::<i32>(&b).await, None);
        let cold_neighbour = redis_cache(neighbour.keys().prefix(), Duration::from_secs(2)).await.unwrap();
        assert_eq!(cold_neighbour.get::<i32>(&other).await, Some(3));

        neighbour.clear().await;
    }

    #[tokio::test]
    async fn test_redis_health_round_trip() {
        let Some(cache) = redis_cache(&unique_prefix(), Duration::from_secs(2)).await else {
            return;
        };

        let health = cache.health().await;
        assert!(health.redis_enabled);
        assert_eq!(health.l2_healthy, Some(true));
        assert!(health.healthy);
    }

    #[tokio::test]
    async fn test_redis_timeout_degrades_to_l1() {
        let prefix = unique_prefix();
        let Some(cache) = redis_cache(&prefix, Duration::ZERO).await else {
            return;
        };
        let key = cache.keys().product(&ProductId::from("slow"));

        cache.set(&key, &5, None).await;
        assert_eq!(cache.get::<i32>(&key).await, Some(5));

        // Nothing made it to L2 and the failed read is a plain miss
        let cold = redis_cache(&prefix, Duration::ZERO).await.unwrap();
        assert_eq!(cold.get::<i32>(&key).await, None);
        assert_eq!(cold.health().await.l2_healthy, Some(false));
    }

    #[test]
    fn test_cache_type_label() {
        assert_eq!(cache_type("freightline:stock:product:1"), "stock");
        assert_eq!(cache_type("freightline:geo:distance:1:2"), "geo");
        assert_eq!(cache_type("bare"), "other");
    }
}
