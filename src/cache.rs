//! Bounded query-result cache keyed by exact query text.

use crate::error::DashboardError;
use crate::models::ResultTable;
use moka::future::Cache;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache sizing.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached result tables.
    pub max_entries: u64,
    /// Time-to-live of each entry in seconds.
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            ttl_seconds: 300,
        }
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Result cache with size and TTL eviction.
///
/// Concurrent lookups of the same text while a load is in flight wait for
/// that load instead of starting another one. Failed loads are not stored.
pub struct ResultCache {
    cache: Cache<String, Arc<ResultTable>>,
    lookups: AtomicU64,
    loads: AtomicU64,
}

impl ResultCache {
    /// Create a cache with the given limits.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self {
            cache,
            lookups: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    /// Return the cached table for `key`, running `load` on a miss.
    pub async fn get_or_load<F>(
        &self,
        key: String,
        load: F,
    ) -> Result<Arc<ResultTable>, DashboardError>
    where
        F: Future<Output = Result<ResultTable, DashboardError>>,
    {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let loads = &self.loads;
        self.cache
            .try_get_with(key, async move {
                loads.fetch_add(1, Ordering::Relaxed);
                load.await.map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Whether `key` currently has a cached table.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Drop every cached table.
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("Result cache cleared");
    }

    /// Current counters.
    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;

        let lookups = self.lookups.load(Ordering::Relaxed);
        let misses = self.loads.load(Ordering::Relaxed);
        let hits = lookups.saturating_sub(misses);
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };

        CacheStats {
            entries: self.cache.entry_count(),
            hits,
            misses,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(value: i64) -> ResultTable {
        ResultTable::new(vec!["n".to_string()], vec![vec![json!(value)]])
    }

    #[tokio::test]
    async fn test_hit_skips_load() {
        let cache = ResultCache::new(&CacheConfig::default());

        let first = cache
            .get_or_load("SELECT 1".to_string(), async { Ok(table(1)) })
            .await
            .unwrap();
        let second = cache
            .get_or_load("SELECT 1".to_string(), async { Ok(table(2)) })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.rows[0][0], json!(1));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = ResultCache::new(&CacheConfig::default());

        let err = cache
            .get_or_load("SELECT broken".to_string(), async {
                Err(DashboardError::Timeout { seconds: 1 })
            })
            .await;
        assert!(matches!(err, Err(DashboardError::Timeout { .. })));
        assert!(!cache.contains("SELECT broken"));

        let ok = cache
            .get_or_load("SELECT broken".to_string(), async { Ok(table(3)) })
            .await;
        tokio_test::assert_ok!(ok);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ResultCache::new(&CacheConfig::default());
        cache
            .get_or_load("SELECT 1".to_string(), async { Ok(table(1)) })
            .await
            .unwrap();
        assert!(cache.contains("SELECT 1"));

        cache.clear().await;
        assert!(!cache.contains("SELECT 1"));
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = ResultCache::new(&CacheConfig {
            max_entries: 2,
            ttl_seconds: 60,
        });

        for i in 0..10 {
            cache
                .get_or_load(format!("SELECT {}", i), async move { Ok(table(i)) })
                .await
                .unwrap();
        }

        assert!(cache.stats().await.entries <= 2);
    }
}
