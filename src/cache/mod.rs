//! In-process TTL cache shared by every read and write path.
//!
//! Values are stored as JSON documents so any serializable payload can be
//! cached. The cache never fails a caller: entries that cannot be encoded are
//! not stored, and entries that cannot be decoded into the requested type are
//! reported as misses.

pub mod keys;
mod pattern;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CacheConfig;
pub use keys::Namespace;
pub use pattern::KeyPattern;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
}

pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttls: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    #[must_use]
    pub fn new(ttls: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttls,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Default lifetime for a key, derived from its namespace.
    #[must_use]
    pub fn default_ttl(&self, key: &str) -> Duration {
        let secs = match Namespace::of(key) {
            Namespace::Categories => self.ttls.categories_ttl_seconds,
            Namespace::Services => self.ttls.services_ttl_seconds,
            Namespace::Search => self.ttls.search_ttl_seconds,
            Namespace::User => self.ttls.user_ttl_seconds,
            Namespace::Other => self.ttls.default_ttl_seconds,
        };
        Duration::from_secs(secs)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let lookup = {
            let entries = self.entries.read().await;
            entries
                .get(key)
                .map(|entry| (entry.is_expired(now), entry.value.clone()))
        };

        let value = match lookup {
            Some((false, value)) => value,
            Some((true, _)) => {
                let mut entries = self.entries.write().await;
                if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                    entries.remove(key);
                }
                drop(entries);
                self.record_miss(key);
                return None;
            }
            None => {
                self.record_miss(key);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => {
                self.record_hit(key);
                Some(decoded)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value could not be decoded, treating as miss");
                self.record_miss(key);
                None
            }
        }
    }

    /// Stores `value` under `key`. Returns `false` when the value is null or
    /// cannot be serialized; nothing is stored in that case.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(serde_json::Value::Null) => return false,
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, error = %e, "Value could not be cached");
                return false;
            }
        };

        let ttl = ttl.unwrap_or_else(|| self.default_ttl(key));
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };

        self.entries.write().await.insert(key.to_string(), entry);
        true
    }

    pub async fn delete(&self, key: &str) -> usize {
        usize::from(self.entries.write().await.remove(key).is_some())
    }

    /// Removes every key matching `pattern` and returns how many were removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let matcher = KeyPattern::compile(pattern);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !matcher.matches(key));
        let removed = before - entries.len();
        drop(entries);

        debug!(pattern = %pattern, removed, "Cache pattern invalidated");
        removed
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drops expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        CacheStats {
            hits,
            misses,
            hit_rate,
            entries: self.entries.read().await.len(),
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Spawns the background sweeper. The task exits once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.purge_expired().await;
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }

    fn record_hit(&self, key: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cache_hits_total", "namespace" => Namespace::of(key).as_str())
            .increment(1);
    }

    fn record_miss(&self, key: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cache_misses_total", "namespace" => Namespace::of(key).as_str())
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CacheStore {
        CacheStore::new(CacheConfig::default())
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = store();
        assert!(cache.set("services:id:1", &vec![1, 2, 3], None).await);
        let value: Option<Vec<i32>> = cache.get("services:id:1").await;
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_set_null_is_rejected() {
        let cache = store();
        assert!(!cache.set("x", &Option::<String>::None, None).await);
        assert!(!cache.set("x", &serde_json::Value::Null, None).await);
        let value: Option<String> = cache.get("x").await;
        assert!(value.is_none());
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_stats_count_hits_and_misses() {
        let cache = store();
        cache.set("categories:all", &"x", None).await;

        let _: Option<String> = cache.get("categories:all").await;
        let _: Option<String> = cache.get("categories:all").await;
        let _: Option<String> = cache.get("categories:9").await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);

        cache.reset_stats();
        assert_eq!(cache.stats().await.hits, 0);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_a_miss() {
        let cache = store();
        cache.set("user:1:profile", &"not a number", None).await;
        let value: Option<u64> = cache.get("user:1:profile").await;
        assert!(value.is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_delete_returns_count() {
        let cache = store();
        cache.set("services:id:1", &1, None).await;
        assert_eq!(cache.delete("services:id:1").await, 1);
        assert_eq!(cache.delete("services:id:1").await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_pattern_removes_only_prefixed_keys() {
        let cache = store();
        let keys = [
            "services:category:3:page:1:limit:20",
            "services:category:3:page:2:limit:20",
            "services:category:30:page:1:limit:20",
            "services:id:3",
            "categories:3",
        ];
        for key in keys {
            cache.set(key, &key, None).await;
        }

        assert_eq!(cache.invalidate_pattern("services:category:3:*").await, 2);

        for key in &keys[2..] {
            let value: Option<String> = cache.get(key).await;
            assert_eq!(value.as_deref(), Some(*key));
        }
        let gone: Option<String> = cache.get(keys[0]).await;
        assert!(gone.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = store();
        cache
            .set("search:q:x", &"v", Some(Duration::from_secs(5)))
            .await;

        tokio::time::advance(Duration::from_secs(4)).await;
        let value: Option<String> = cache.get("search:q:x").await;
        assert!(value.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        let value: Option<String> = cache.get("search:q:x").await;
        assert!(value.is_none());
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_namespace_default_ttls() {
        let cache = store();
        assert_eq!(cache.default_ttl("categories:all"), Duration::from_secs(3600));
        assert_eq!(cache.default_ttl("services:id:1"), Duration::from_secs(1800));
        assert_eq!(cache.default_ttl("search:q:a"), Duration::from_secs(300));
        assert_eq!(cache.default_ttl("user:1:profile"), Duration::from_secs(60));
        assert_eq!(cache.default_ttl("misc"), Duration::from_secs(600));

        cache.set("user:1:profile", &"p", None).await;
        cache.set("categories:all", &"c", None).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.purge_expired().await, 1);
        let value: Option<String> = cache.get("categories:all").await;
        assert!(value.is_some());
    }

    #[tokio::test]
    async fn test_clear_keeps_counters() {
        let cache = store();
        cache.set("a", &1, None).await;
        let _: Option<i32> = cache.get("a").await;
        cache.clear().await;
        let stats = cache.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.hits, 1);
    }
}
