use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks performance metrics for asset loading and caching
#[derive(Debug, Default)]
pub struct AssetMetrics {
    load_times: RwLock<HashMap<String, Duration>>,
    load_counts: RwLock<HashMap<String, u64>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    evictions: AtomicU64,
}

impl AssetMetrics {
    /// Create a new instance of AssetMetrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the load time for an asset
    pub fn record_load_time(&self, key: String, duration: Duration) {
        *self.load_counts.write().entry(key.clone()).or_insert(0) += 1;
        self.load_times.write().insert(key, duration);
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hits over lookups, `0.0..=1.0`; zero before any lookup
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits() as f64;
        let misses = self.cache_misses() as f64;

        if hits + misses > 0.0 {
            hits / (hits + misses)
        } else {
            0.0
        }
    }

    /// Misses over lookups, `0.0..=1.0`; zero before any lookup
    pub fn cache_miss_rate(&self) -> f64 {
        let hits = self.cache_hits() as f64;
        let misses = self.cache_misses() as f64;

        if hits + misses > 0.0 {
            misses / (hits + misses)
        } else {
            0.0
        }
    }

    /// Get the most recent load time for an asset
    pub fn last_load_time(&self, key: &str) -> Option<Duration> {
        self.load_times.read().get(key).cloned()
    }

    /// How many times `key` was loaded (misses that succeeded)
    pub fn load_count(&self, key: &str) -> u64 {
        *self.load_counts.read().get(key).unwrap_or(&0)
    }

    /// Get all recorded load times
    pub fn all_load_times(&self) -> HashMap<String, Duration> {
        self.load_times.read().clone()
    }

    /// Zero the hit/miss/eviction counters. Load history is kept.
    pub fn reset_counters(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// A thread-safe wrapper around AssetMetrics
#[derive(Debug, Clone, Default)]
pub struct AssetMetricsHandle(Arc<AssetMetrics>);

impl AssetMetricsHandle {
    /// Create a new metrics handle
    pub fn new() -> Self {
        Self(Arc::new(AssetMetrics::new()))
    }

    /// Get a reference to the underlying metrics
    pub fn inner(&self) -> &AssetMetrics {
        &self.0
    }
}

impl std::ops::Deref for AssetMetricsHandle {
    type Target = AssetMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let metrics = AssetMetricsHandle::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        assert_eq!(metrics.cache_miss_rate(), 0.0);

        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        assert_eq!(metrics.cache_hit_rate(), 0.75);
        assert_eq!(metrics.cache_miss_rate(), 0.25);

        metrics.reset_counters();
        assert_eq!(metrics.cache_hits(), 0);
        assert_eq!(metrics.cache_misses(), 0);
    }

    #[test]
    fn test_load_history() {
        let metrics = AssetMetrics::new();
        metrics.record_load_time("logo".into(), Duration::from_millis(3));
        metrics.record_load_time("logo".into(), Duration::from_millis(5));

        assert_eq!(metrics.load_count("logo"), 2);
        assert_eq!(metrics.last_load_time("logo"), Some(Duration::from_millis(5)));
        assert_eq!(metrics.load_count("other"), 0);
        assert_eq!(metrics.all_load_times().len(), 1);
    }
}
