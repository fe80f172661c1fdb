//! Fetch-and-retry execution of single assets
//!
//! Each attempt goes through the cache, so a success is stored (and pinned)
//! and a failure leaves nothing behind. Failed attempts wait
//! `retry_delay_step * attempt` before the next one.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::AssetLoader;
use crate::cache::AssetCache;
use crate::config::PreloadOptions;
use crate::error::{AssetError, Result};
use crate::preload::manifest::AssetDescriptor;
use crate::resource::ResourceHandle;
use crate::runtime::AsyncRuntime;

/// Keys that exhausted their retries, in failure order
#[derive(Debug, Default)]
pub struct FailedAssets {
    keys: RwLock<Vec<String>>,
}

impl FailedAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str) {
        let mut keys = self.keys.write();
        if !keys.iter().any(|failed| failed == key) {
            keys.push(key.to_string());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.read().iter().any(|failed| failed == key)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.keys.read().clone()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.keys.write().clear();
    }
}

/// Result of one executor run for one asset
#[derive(Debug)]
pub struct LoadOutcome {
    pub key: String,
    pub success: bool,
    pub attempts: u32,
    pub handle: Option<ResourceHandle>,
    pub error: Option<AssetError>,
}

impl LoadOutcome {
    fn loaded(key: &str, attempts: u32, handle: ResourceHandle) -> Self {
        Self {
            key: key.to_string(),
            success: true,
            attempts,
            handle: Some(handle),
            error: None,
        }
    }

    fn failed(key: &str, attempts: u32, error: AssetError) -> Self {
        Self {
            key: key.to_string(),
            success: false,
            attempts,
            handle: None,
            error: Some(error),
        }
    }
}

/// Loads single assets through the cache with bounded retry
#[derive(Debug, Clone)]
pub struct FetchExecutor<R: AsyncRuntime> {
    loader: AssetLoader,
    runtime: R,
    failed: Arc<FailedAssets>,
}

impl<R: AsyncRuntime> FetchExecutor<R> {
    pub fn new(loader: AssetLoader, runtime: R) -> Self {
        Self {
            loader,
            runtime,
            failed: Arc::new(FailedAssets::new()),
        }
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        self.loader.cache()
    }

    pub fn loader(&self) -> &AssetLoader {
        &self.loader
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn failed(&self) -> &Arc<FailedAssets> {
        &self.failed
    }

    /// Loads `asset`, retrying transient failures.
    ///
    /// Makes at most `max_retries + 1` attempts. A malformed atlas stops
    /// retrying at once and an invalid descriptor is never attempted. Once attempts are used up, a tolerant run records the key in
    /// [`FailedAssets`] and returns an unsuccessful outcome; otherwise the
    /// error is returned as [`AssetError::RetriesExhausted`].
    pub async fn load(
        &self,
        asset: &AssetDescriptor,
        options: &PreloadOptions,
    ) -> Result<LoadOutcome> {
        let key = asset.key();
        let total_attempts = options.total_attempts();

        let (attempts, error) = match asset.validate() {
            Err(err) => (0, err),
            Ok(()) => {
                let locator = self.loader.locator_for(asset);
                let mut attempt = 0;
                loop {
                    attempt += 1;
                    let result = self
                        .cache()
                        .get_or_load_in(self.loader.namespace(), key, &locator, || {
                            self.loader.load(asset)
                        })
                        .await;

                    match result {
                        Ok(handle) => {
                            debug!(key, attempt, "asset loaded");
                            return Ok(LoadOutcome::loaded(key, attempt, handle));
                        }
                        Err(err) => {
                            warn!(key, attempt, total_attempts, error = %err, "asset load attempt failed");
                            if !err.is_transient() || attempt >= total_attempts {
                                break (attempt, err);
                            }
                            self.runtime.sleep(options.delay_after(attempt)).await;
                        }
                    }
                }
            }
        };

        warn!(key, attempts, error = %error, "asset failed permanently");
        if options.continue_on_error {
            self.failed.insert(key);
            Ok(LoadOutcome::failed(key, attempts, error))
        } else {
            Err(AssetError::RetriesExhausted {
                key: key.to_string(),
                attempts,
                source: Box::new(error),
            })
        }
    }
}
