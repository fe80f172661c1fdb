//! Reference-counted asset cache with LRU eviction under memory pressure
//!
//! Entries are keyed by string and hold a [`ResourceHandle`]. Every
//! successful `get_or_load` pins the entry (ref count + 1) until a matching
//! `release`. Only unpinned entries are eviction candidates, so the cache
//! can stay over budget when everything resident is in use.

pub mod metrics;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::lock::Mutex as AsyncMutex;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::atlas::{alias_key, frame_key};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::resource::ResourceHandle;
use metrics::AssetMetricsHandle;

/// A resident cache entry
#[derive(Debug)]
struct CacheEntry {
    resource: ResourceHandle,
    ref_count: AtomicUsize,
    last_access: AtomicU64,
    size_bytes: usize,
    source: String,
    namespace: Option<String>,
}

/// Diagnostic snapshot of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: String,
    pub ref_count: usize,
    /// Logical access tick; larger is more recent.
    pub last_access: u64,
    pub size_bytes: usize,
    pub source: String,
    pub namespace: Option<String>,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub count: usize,
    pub total_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Hits over lookups, `0.0..=1.0`.
    pub hit_rate: f64,
    /// Misses over lookups, `0.0..=1.0`.
    pub miss_rate: f64,
}

/// Ref-counted key → resource store with a memory budget
///
/// Construct one per engine and share it by `Arc`; there is no global
/// instance.
pub struct AssetCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// One gate per key with a load in progress.
    inflight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Alias → cache key. Kept apart from `entries`.
    aliases: RwLock<HashMap<String, String>>,
    current_memory: AtomicUsize,
    clock: AtomicU64,
    config: CacheConfig,
    /// Performance metrics for asset loading and caching
    metrics: AssetMetricsHandle,
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("entries", &self.len())
            .field("memory_usage", &self.memory_usage())
            .field("config", &self.config)
            .finish()
    }
}

impl AssetCache {
    /// Creates a cache with the given memory budget in bytes
    pub fn new(max_memory: usize) -> Self {
        Self::with_config(CacheConfig::with_max_memory(max_memory))
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            current_memory: AtomicUsize::new(0),
            clock: AtomicU64::new(0),
            config,
            metrics: AssetMetricsHandle::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached handle for `key`, loading it on a miss.
    ///
    /// A hit pins the entry and counts a hit. A miss runs `loader`, stores
    /// its result with ref count 1, counts a miss and runs the eviction
    /// check. Loader errors propagate and leave no entry behind.
    ///
    /// Concurrent calls for the same missing key share one load: later
    /// callers wait for the first and then see its entry as a hit.
    pub async fn get_or_load<F, Fut, R>(
        &self,
        key: &str,
        source: &str,
        loader: F,
    ) -> Result<ResourceHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>>,
        R: Into<ResourceHandle>,
    {
        self.get_or_load_in(None, key, source, loader).await
    }

    /// [`get_or_load`](Self::get_or_load) that tags a new entry with `namespace`.
    pub async fn get_or_load_in<F, Fut, R>(
        &self,
        namespace: Option<&str>,
        key: &str,
        source: &str,
        loader: F,
    ) -> Result<ResourceHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>>,
        R: Into<ResourceHandle>,
    {
        if let Some(handle) = self.acquire(key) {
            self.metrics.record_cache_hit();
            debug!(key, "cache hit");
            return Ok(handle);
        }

        let gate = GateRelease::open(self, key);
        let _permit = gate.gate.lock().await;

        if let Some(handle) = self.acquire(key) {
            self.metrics.record_cache_hit();
            debug!(key, "cache hit after waiting on in-flight load");
            return Ok(handle);
        }

        self.metrics.record_cache_miss();
        debug!(key, source, "cache miss");

        let start_time = Instant::now();
        match loader().await {
            Ok(loaded) => {
                let handle: ResourceHandle = loaded.into();
                self.metrics
                    .record_load_time(key.to_string(), start_time.elapsed());
                self.insert(key, source, namespace, handle.clone());
                Ok(handle)
            }
            Err(err) => {
                debug!(key, error = %err, "load failed, nothing cached");
                Err(err)
            }
        }
    }

    /// Non-blocking lookup.
    ///
    /// Never loads and never changes the ref count; only refreshes recency.
    pub fn get_sync(&self, key: &str) -> Option<ResourceHandle> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        entry.last_access.store(self.tick(), Ordering::Relaxed);
        Some(entry.resource.clone())
    }

    /// Looks up an atlas frame by name.
    ///
    /// Tries the exact name, then its lowercase and uppercase forms.
    pub fn get_frame(&self, atlas_key: &str, frame_name: &str) -> Option<ResourceHandle> {
        self.get_sync(&frame_key(atlas_key, frame_name))
            .or_else(|| self.get_sync(&frame_key(atlas_key, &frame_name.to_lowercase())))
            .or_else(|| self.get_sync(&frame_key(atlas_key, &frame_name.to_uppercase())))
    }

    /// Points the alias for `name` at the resident entry `target`.
    ///
    /// Aliases live in their own index and never shadow cache keys. An
    /// alias already pointing at a resident entry is kept. Returns `true`
    /// when the alias was newly set.
    pub fn register_alias(&self, name: &str, target: &str) -> bool {
        if !self.contains(target) {
            return false;
        }
        let alias = alias_key(name);
        let mut aliases = self.aliases.write();
        if let Some(existing) = aliases.get(&alias) {
            if existing == target || self.contains(existing) {
                return false;
            }
        }
        aliases.insert(alias, target.to_string());
        true
    }

    /// Cache key the alias for `name` points at, if any.
    pub fn alias_target(&self, name: &str) -> Option<String> {
        self.aliases.read().get(&alias_key(name)).cloned()
    }

    /// Looks up a resource through its alias, e.g. `"cherry"` for the
    /// frame `"Symbols/Cherry.png"`. Same recency rules as `get_sync`.
    pub fn get_alias(&self, name: &str) -> Option<ResourceHandle> {
        let target = self.alias_target(name)?;
        self.get_sync(&target)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Current ref count of `key`, if resident.
    pub fn ref_count(&self, key: &str) -> Option<usize> {
        self.entries
            .read()
            .get(key)
            .map(|entry| entry.ref_count.load(Ordering::Acquire))
    }

    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        self.entries.read().get(key).map(|entry| EntryInfo {
            key: key.to_string(),
            ref_count: entry.ref_count.load(Ordering::Acquire),
            last_access: entry.last_access.load(Ordering::Relaxed),
            size_bytes: entry.size_bytes,
            source: entry.source.clone(),
            namespace: entry.namespace.clone(),
        })
    }

    /// Resident keys, unordered.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Drops one pin on `key`, flooring at zero.
    ///
    /// Returns the new ref count, or `None` if the key is not resident. The
    /// entry itself stays; removal is eviction's job.
    pub fn release(&self, key: &str) -> Option<usize> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        let previous = entry
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or(0);
        if previous == 0 {
            warn!(key, "release on an entry with no holders");
        }
        Some(previous.saturating_sub(1))
    }

    /// Destroys `key` regardless of its ref count.
    pub fn remove(&self, key: &str) -> Option<ResourceHandle> {
        let mut entries = self.entries.write();
        let removed = entries.remove(key)?;
        self.current_memory
            .fetch_sub(removed.size_bytes, Ordering::SeqCst);
        debug!(key, bytes = removed.size_bytes, "cache entry removed");
        Some(removed.resource)
    }

    /// Destroys every entry tagged with `namespace`, pinned or not.
    ///
    /// Returns `(count, bytes)` removed. Hit/miss counters are untouched.
    pub fn remove_namespace(&self, namespace: &str) -> (usize, usize) {
        let mut entries = self.entries.write();
        let before = entries.len();
        let mut bytes = 0;
        entries.retain(|_, entry| {
            if entry.namespace.as_deref() == Some(namespace) {
                bytes += entry.size_bytes;
                false
            } else {
                true
            }
        });
        let count = before - entries.len();
        self.current_memory.fetch_sub(bytes, Ordering::SeqCst);
        info!(namespace, count, bytes, "namespace removed from cache");
        (count, bytes)
    }

    /// Clears all cached assets and resets hit/miss accounting
    pub fn clear(&self) {
        self.entries.write().clear();
        self.aliases.write().clear();
        self.current_memory.store(0, Ordering::SeqCst);
        self.metrics.reset_counters();
    }

    /// Gets the current memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.current_memory.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let (count, total_bytes) = {
            let entries = self.entries.read();
            (entries.len(), self.memory_usage())
        };
        CacheStats {
            count,
            total_bytes,
            hits: self.metrics.cache_hits(),
            misses: self.metrics.cache_misses(),
            evictions: self.metrics.evictions(),
            hit_rate: self.metrics.cache_hit_rate(),
            miss_rate: self.metrics.cache_miss_rate(),
        }
    }

    /// Get a reference to the metrics handle
    pub fn metrics(&self) -> &AssetMetricsHandle {
        &self.metrics
    }

    /// Pins and returns `key` if resident.
    fn acquire(&self, key: &str) -> Option<ResourceHandle> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        entry.ref_count.fetch_add(1, Ordering::AcqRel);
        entry.last_access.store(self.tick(), Ordering::Relaxed);
        Some(entry.resource.clone())
    }

    fn insert(&self, key: &str, source: &str, namespace: Option<&str>, resource: ResourceHandle) {
        let size_bytes = resource.size_bytes();
        let entry = CacheEntry {
            resource,
            ref_count: AtomicUsize::new(1),
            last_access: AtomicU64::new(self.tick()),
            size_bytes,
            source: source.to_string(),
            namespace: namespace.map(str::to_string),
        };

        let mut entries = self.entries.write();
        if let Some(replaced) = entries.insert(key.to_string(), entry) {
            self.current_memory
                .fetch_sub(replaced.size_bytes, Ordering::SeqCst);
        }
        self.current_memory.fetch_add(size_bytes, Ordering::SeqCst);
        debug!(key, bytes = size_bytes, "cache entry inserted");

        self.evict_if_needed(&mut entries);
    }

    /// Evicts unpinned entries, least recently used first, until resident
    /// size is at or below the eviction floor.
    fn evict_if_needed(&self, entries: &mut HashMap<String, CacheEntry>) {
        let max_memory = self.config.max_memory_bytes;
        if self.memory_usage() <= max_memory {
            return;
        }

        let floor = self.config.eviction_floor();
        let mut candidates: Vec<(u64, String)> = entries
            .iter()
            .filter(|(_, entry)| entry.ref_count.load(Ordering::Acquire) == 0)
            .map(|(key, entry)| (entry.last_access.load(Ordering::Relaxed), key.clone()))
            .collect();
        candidates.sort_unstable();

        let mut evicted = 0usize;
        let mut freed = 0usize;
        for (_, key) in candidates {
            if self.memory_usage() <= floor {
                break;
            }
            if let Some(removed) = entries.remove(&key) {
                self.current_memory
                    .fetch_sub(removed.size_bytes, Ordering::SeqCst);
                freed += removed.size_bytes;
                evicted += 1;
                debug!(key = %key, bytes = removed.size_bytes, "evicted");
            }
        }
        self.metrics.record_evictions(evicted as u64);

        let remaining = self.memory_usage();
        if remaining > floor {
            warn!(
                remaining,
                max_memory, "cache over budget, remaining entries are in use"
            );
        }
        info!(evicted, freed, remaining, "eviction pass finished");
    }

    fn gate(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut inflight = self.inflight.lock();
        Arc::clone(
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Drops the gate once no other caller holds or waits on it.
    fn close_gate(&self, key: &str, gate: &Arc<AsyncMutex<()>>) {
        let mut inflight = self.inflight.lock();
        let idle = inflight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, gate) && Arc::strong_count(gate) <= 2);
        if idle {
            inflight.remove(key);
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Closes a key's in-flight gate when the load returns or its future is
/// dropped mid-load.
struct GateRelease<'a> {
    cache: &'a AssetCache,
    key: &'a str,
    gate: Arc<AsyncMutex<()>>,
}

impl<'a> GateRelease<'a> {
    fn open(cache: &'a AssetCache, key: &'a str) -> Self {
        Self {
            cache,
            key,
            gate: cache.gate(key),
        }
    }
}

impl Drop for GateRelease<'_> {
    fn drop(&mut self) {
        self.cache.close_gate(self.key, &self.gate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use crate::resource::Resource;
    use bytes::Bytes;
    use futures::executor::block_on;
    use futures::FutureExt;

    fn blob(size: usize) -> Resource {
        Resource::Bytes(Bytes::from(vec![0u8; size]))
    }

    fn load(cache: &AssetCache, key: &str, size: usize) -> ResourceHandle {
        block_on(cache.get_or_load(key, "test://", || async move { Ok(blob(size)) })).unwrap()
    }

    #[test]
    fn test_cache_creation() {
        let cache = AssetCache::new(100 * 1024 * 1024);
        assert_eq!(cache.memory_usage(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_and_miss_accounting() {
        let cache = AssetCache::new(1024);
        load(&cache, "a", 10);
        load(&cache, "a", 10);
        load(&cache, "a", 10);

        let stats = cache.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total_bytes, 10);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.miss_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(cache.ref_count("a"), Some(3));
    }

    #[test]
    fn test_loader_not_called_on_hit() {
        let cache = AssetCache::new(1024);
        let first = load(&cache, "a", 4);
        let second = block_on(cache.get_or_load("a", "test://", || async {
            Err::<Resource, _>(AssetError::Cache("loader must not run".into()))
        }))
        .unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn test_failed_load_creates_no_entry() {
        let cache = AssetCache::new(1024);
        let result = block_on(cache.get_or_load("bad", "test://bad", || async {
            Err::<Resource, _>(AssetError::fetch("test://bad", "404"))
        }));
        assert!(result.is_err());
        assert!(!cache.contains("bad"));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_release_floors_at_zero() {
        let cache = AssetCache::new(1024);
        load(&cache, "a", 1);
        load(&cache, "a", 1);
        assert_eq!(cache.release("a"), Some(1));
        assert_eq!(cache.release("a"), Some(0));
        assert_eq!(cache.release("a"), Some(0));
        assert!(cache.contains("a"));
        assert_eq!(cache.release("missing"), None);
    }

    #[test]
    fn test_get_sync_does_not_pin_or_load() {
        let cache = AssetCache::new(1024);
        assert!(cache.get_sync("a").is_none());
        load(&cache, "a", 1);
        cache.release("a");
        assert!(cache.get_sync("a").is_some());
        assert_eq!(cache.ref_count("a"), Some(0));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_eviction_lru_to_eighty_percent() {
        let cache = AssetCache::new(100);
        for key in ["a", "b", "c", "d"] {
            load(&cache, key, 25);
            cache.release(key);
        }
        assert_eq!(cache.memory_usage(), 100);

        // touch "a" so "b" is the oldest
        cache.get_sync("a");

        load(&cache, "e", 25);
        // 125 > 100: evict b then c to reach 75 <= 80
        assert!(!cache.contains("b"));
        assert!(!cache.contains("c"));
        assert!(cache.contains("a"));
        assert!(cache.contains("d"));
        assert!(cache.contains("e"));
        assert_eq!(cache.memory_usage(), 75);
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_eviction_skips_pinned_entries() {
        let cache = AssetCache::new(100);
        load(&cache, "pinned", 60);
        load(&cache, "free", 30);
        cache.release("free");

        load(&cache, "new", 40);
        assert!(cache.contains("pinned"));
        assert!(cache.contains("new"));
        assert!(!cache.contains("free"));
        // nothing left to evict, cache stays over budget
        assert_eq!(cache.memory_usage(), 100);

        load(&cache, "more", 10);
        assert_eq!(cache.memory_usage(), 110);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_remove_ignores_ref_count() {
        let cache = AssetCache::new(1024);
        load(&cache, "a", 8);
        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_clear_resets_counters() {
        let cache = AssetCache::new(1024);
        load(&cache, "a", 8);
        load(&cache, "a", 8);
        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_namespaces() {
        let cache = AssetCache::new(1024);
        block_on(cache.get_or_load_in(Some("slots"), "reel", "x", || async { Ok(blob(10)) }))
            .unwrap();
        block_on(cache.get_or_load_in(Some("poker"), "card", "x", || async { Ok(blob(20)) }))
            .unwrap();
        load(&cache, "shared", 5);

        assert_eq!(cache.remove_namespace("slots"), (1, 10));
        assert!(!cache.contains("reel"));
        assert!(cache.contains("card"));
        assert!(cache.contains("shared"));
        assert_eq!(cache.memory_usage(), 25);
        assert_eq!(
            cache.entry_info("card").unwrap().namespace.as_deref(),
            Some("poker")
        );
    }

    #[test]
    fn test_concurrent_loads_share_one_fetch() {
        use std::sync::atomic::AtomicUsize;

        /// Pending once, so the second caller starts while the first loads.
        struct YieldOnce(bool);

        impl Future for YieldOnce {
            type Output = ();

            fn poll(
                mut self: std::pin::Pin<&mut Self>,
                cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<()> {
                if self.0 {
                    return std::task::Poll::Ready(());
                }
                self.0 = true;
                cx.waker().wake_by_ref();
                std::task::Poll::Pending
            }
        }

        let cache = AssetCache::new(1024);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let loader = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            YieldOnce(false).await;
            Ok(blob(3))
        };

        let (a, b) = block_on(futures::future::join(
            cache.get_or_load("k", "x", loader),
            cache.get_or_load("k", "x", loader),
        ));

        assert!(a.unwrap().ptr_eq(&b.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.ref_count("k"), Some(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 1);
        assert!(cache.inflight.lock().is_empty());
    }

    #[test]
    fn test_dropped_load_releases_gate() {
        let cache = AssetCache::new(1024);
        let stalled = cache.get_or_load("k", "x", || {
            futures::future::pending::<Result<Resource>>()
        });
        assert!(stalled.now_or_never().is_none());

        assert!(cache.inflight.lock().is_empty());
        assert!(!cache.contains("k"));
        load(&cache, "k", 4);
        assert_eq!(cache.ref_count("k"), Some(1));
        assert!(cache.inflight.lock().is_empty());
    }

    #[test]
    fn test_aliases_do_not_shadow_keys() {
        let cache = AssetCache::new(1024);
        load(&cache, "reels:Bell.png", 4);

        assert!(cache.register_alias("Bell.png", "reels:Bell.png"));
        assert!(!cache.register_alias("bell", "reels:Bell.png"));
        assert!(!cache.register_alias("ghost", "reels:missing"));
        assert!(cache.get_alias("BELL").is_some());
        assert!(!cache.contains("bell"));
        assert_eq!(cache.len(), 1);

        // a real asset under the alias name is a miss and loads
        let data = load(&cache, "bell", 9);
        assert_eq!(data.size_bytes(), 9);
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.alias_target("bell").as_deref(), Some("reels:Bell.png"));

        // a stale alias is repointed
        cache.remove("reels:Bell.png");
        assert!(cache.get_alias("bell").is_none());
        load(&cache, "ui:bell", 2);
        assert!(cache.register_alias("bell", "ui:bell"));

        cache.clear();
        assert!(cache.alias_target("bell").is_none());
    }
}
