//! Bulk teardown of cached assets

use tracing::info;

use crate::cache::AssetCache;

/// What a dispose call removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub count: usize,
    pub bytes_freed: usize,
}

/// Destroys every entry, pinned or not, and resets hit/miss counters.
pub fn dispose_all(cache: &AssetCache) -> DisposeReport {
    let before = cache.stats();
    cache.clear();
    let after = cache.stats();

    let report = DisposeReport {
        count: before.count.saturating_sub(after.count),
        bytes_freed: before.total_bytes.saturating_sub(after.total_bytes),
    };
    info!(count = report.count, bytes = report.bytes_freed, "disposed all assets");
    report
}

/// Destroys the entries loaded for `game` only.
///
/// Other games' entries and the global hit/miss counters are untouched.
pub fn dispose_game(cache: &AssetCache, game: &str) -> DisposeReport {
    let (count, bytes_freed) = cache.remove_namespace(game);
    info!(game, count, bytes = bytes_freed, "disposed game assets");
    DisposeReport { count, bytes_freed }
}
