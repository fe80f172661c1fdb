//! Engine configuration and default tables
//!
//! Every tunable has exactly one default, declared here:
//!
//! | Setting                      | Default   |
//! |------------------------------|-----------|
//! | `cache.max_memory_bytes`     | 256 MiB   |
//! | `cache.eviction_target`      | 0.8       |
//! | `preload.max_retries`        | 2         |
//! | `preload.continue_on_error`  | `true`    |
//! | `preload.retry_delay_step`   | 100 ms    |
//! | `game`, `version`, `base_url`| empty     |

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Default memory budget for the cache (256 MB).
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 256 * 1024 * 1024;

/// Fraction of the budget eviction shrinks the cache down to.
pub const DEFAULT_EVICTION_TARGET: f64 = 0.8;

/// Retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Back-off step; attempt `n` waits `n * step` before the next try.
pub const DEFAULT_RETRY_DELAY_STEP: Duration = Duration::from_millis(100);

/// Memory budget for [`AssetCache`](crate::AssetCache).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Budget in bytes. Eviction starts once resident size exceeds it.
    pub max_memory_bytes: usize,
    /// Eviction stops once resident size is at or below `max_memory_bytes * eviction_target`.
    pub eviction_target: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            eviction_target: DEFAULT_EVICTION_TARGET,
        }
    }
}

impl CacheConfig {
    /// Budget with the default eviction target.
    pub fn with_max_memory(max_memory_bytes: usize) -> Self {
        Self {
            max_memory_bytes,
            ..Self::default()
        }
    }

    /// Resident size eviction shrinks down to.
    pub fn eviction_floor(&self) -> usize {
        let target = self.eviction_target.clamp(0.0, 1.0);
        (self.max_memory_bytes as f64 * target).floor() as usize
    }
}

/// Per-run options for the preload orchestrator and the retry executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreloadOptions {
    /// Extra attempts after the first; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Record exhausted assets and keep going instead of aborting the run.
    pub continue_on_error: bool,
    /// Fixed back-off step between attempts.
    #[serde(with = "millis")]
    pub retry_delay_step: Duration,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            continue_on_error: true,
            retry_delay_step: DEFAULT_RETRY_DELAY_STEP,
        }
    }
}

impl PreloadOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Total attempts a single asset gets.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.retry_delay_step.saturating_mul(attempt)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Game namespace; cache entries loaded by the preloader are tagged with it.
    pub game: String,
    /// Asset version segment used by the path resolver.
    pub version: String,
    /// Root locator assets are resolved against.
    pub base_url: String,
    pub cache: CacheConfig,
    pub preload: PreloadOptions,
}

impl EngineConfig {
    /// Parse a JSON config; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
