//! Phased preloading of a manifest
//!
//! A run walks the phases in [`AssetKind::PHASES`] order and loads every
//! asset of a phase one after another, so progress is reported in manifest
//! order. Only one run may be active per [`Preloader`]; `abort()` takes
//! effect at the next asset boundary.

pub mod events;
pub mod manifest;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::cache::{AssetCache, CacheStats};
use crate::config::{EngineConfig, PreloadOptions};
use crate::dispose::{self, DisposeReport};
use crate::error::Result;
use crate::loader::{AssetLoader, FetchExecutor};
use crate::resolver::PrefixResolver;
use crate::resource::ResourceHandle;
use crate::runtime::{AsyncRuntime, JoinHandle};
use crate::source::AssetSource;

pub use events::{ChannelSink, EventSink, NullSink, PreloadEvent, PreloadProgress, RecordingSink};
pub use manifest::{AssetDescriptor, AssetKind, PreloadManifest};

/// Lifecycle of a [`Preloader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadState {
    Idle,
    Running,
    Complete,
    /// Stopped by a fatal failure or by `abort()`.
    Aborted,
}

/// How a `preload` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    /// Another run was already active; nothing was loaded.
    Skipped,
}

/// Summary returned by [`Preloader::preload`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadReport {
    pub status: RunStatus,
    /// Assets attempted, successful or not.
    pub loaded: usize,
    pub total: usize,
    /// Keys that exhausted their retries.
    pub failed: Vec<String>,
}

/// Cloneable handle that requests a cooperative stop
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Preload orchestrator
///
/// Owns the retry executor and, through it, a shared [`AssetCache`].
/// Construct one per engine and pass it by reference or `Arc`.
pub struct Preloader<R: AsyncRuntime> {
    executor: FetchExecutor<R>,
    sink: Arc<dyn EventSink>,
    options: PreloadOptions,
    state: RwLock<PreloadState>,
    progress: RwLock<PreloadProgress>,
    abort: AbortHandle,
}

impl<R: AsyncRuntime> std::fmt::Debug for Preloader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preloader")
            .field("state", &self.state())
            .field("progress", &self.progress())
            .field("runtime", &self.executor.runtime().runtime_name())
            .finish()
    }
}

impl<R: AsyncRuntime> Preloader<R> {
    pub fn new(executor: FetchExecutor<R>) -> Self {
        Self {
            executor,
            sink: Arc::new(NullSink),
            options: PreloadOptions::default(),
            state: RwLock::new(PreloadState::Idle),
            progress: RwLock::new(PreloadProgress::default()),
            abort: AbortHandle::default(),
        }
    }

    /// Wires a full engine from `config`: a cache with the configured
    /// budget, a prefix resolver and a loader namespaced by `config.game`.
    pub fn from_config(config: &EngineConfig, source: Arc<dyn AssetSource>, runtime: R) -> Self {
        let cache = Arc::new(AssetCache::with_config(config.cache));
        let namespace = (!config.game.is_empty()).then(|| config.game.clone());
        let loader = AssetLoader::new(source, Arc::new(PrefixResolver::from_config(config)), cache)
            .with_namespace(namespace);

        Self::new(FetchExecutor::new(loader, runtime)).with_options(config.preload)
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Options used by [`spawn_preload`](Self::spawn_preload) and [`preload_default`](Self::preload_default).
    pub fn with_options(mut self, options: PreloadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PreloadOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        self.executor.cache()
    }

    pub fn executor(&self) -> &FetchExecutor<R> {
        &self.executor
    }

    pub fn state(&self) -> PreloadState {
        *self.state.read()
    }

    pub fn progress(&self) -> PreloadProgress {
        self.progress.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PreloadState::Running
    }

    /// Requests the current run to stop before its next asset.
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Loads every asset in `manifest`.
    ///
    /// Returns [`RunStatus::Skipped`] at once if a run is already active.
    /// Dropping the returned future mid-run leaves the state `Aborted`.
    /// With `continue_on_error` unset, the first asset to exhaust its
    /// retries stops the run: an `Error` event is emitted last and the
    /// error is returned.
    pub async fn preload(
        &self,
        manifest: &PreloadManifest,
        options: PreloadOptions,
    ) -> Result<PreloadReport> {
        let total = manifest.total_count();
        if !self.begin(total) {
            info!("preload already running, request skipped");
            return Ok(PreloadReport {
                status: RunStatus::Skipped,
                loaded: 0,
                total,
                failed: Vec::new(),
            });
        }
        let _run = RunGuard { state: &self.state };

        info!(total, max_retries = options.max_retries, "preload started");
        self.sink.emit(PreloadEvent::Started { total });

        for kind in AssetKind::PHASES {
            for asset in manifest.phase(kind) {
                if self.abort.is_aborted() {
                    return Ok(self.cancel());
                }

                if let Err(err) = self.executor.load(&asset, &options).await {
                    *self.state.write() = PreloadState::Aborted;
                    warn!(key = asset.key(), error = %err, "preload aborted");
                    self.sink.emit(PreloadEvent::Error {
                        key: asset.key().to_string(),
                        message: err.to_string(),
                    });
                    return Err(err);
                }

                let progress = {
                    let mut progress = self.progress.write();
                    progress.advance(kind, asset.key());
                    progress.clone()
                };
                self.sink.emit(PreloadEvent::Progress(progress));
            }
        }

        let loaded = self.progress.read().loaded_count;
        *self.state.write() = PreloadState::Complete;
        let failed = self.failed_assets();
        info!(total, loaded, failed = failed.len(), "preload complete");
        self.sink.emit(PreloadEvent::Completed { total, loaded });

        Ok(PreloadReport {
            status: RunStatus::Completed,
            loaded,
            total,
            failed,
        })
    }

    /// [`preload`](Self::preload) with the configured options.
    pub async fn preload_default(&self, manifest: &PreloadManifest) -> Result<PreloadReport> {
        self.preload(manifest, self.options).await
    }

    /// Runs [`preload_default`](Self::preload_default) as a background task.
    ///
    /// Progress is observable through the sink and [`progress`](Self::progress).
    pub fn spawn_preload(self: &Arc<Self>, manifest: PreloadManifest) -> JoinHandle {
        let preloader = Arc::clone(self);
        self.executor.runtime().spawn(async move {
            if let Err(err) = preloader.preload_default(&manifest).await {
                warn!(error = %err, "background preload failed");
            }
        })
    }

    pub fn has_asset_failed(&self, key: &str) -> bool {
        self.executor.failed().contains(key)
    }

    pub fn failed_assets(&self) -> Vec<String> {
        self.executor.failed().snapshot()
    }

    /// Cache lookup-or-load, tagged with this preloader's namespace.
    pub async fn get_or_load<F, Fut, T>(
        &self,
        key: &str,
        source: &str,
        loader: F,
    ) -> Result<ResourceHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<ResourceHandle>,
    {
        self.cache()
            .get_or_load_in(self.executor.loader().namespace(), key, source, loader)
            .await
    }

    pub fn get_sync(&self, key: &str) -> Option<ResourceHandle> {
        self.cache().get_sync(key)
    }

    pub fn get_frame(&self, atlas_key: &str, frame_name: &str) -> Option<ResourceHandle> {
        self.cache().get_frame(atlas_key, frame_name)
    }

    /// Lookup through an atlas frame alias such as `"cherry"`.
    pub fn get_alias(&self, name: &str) -> Option<ResourceHandle> {
        self.cache().get_alias(name)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn dispose_all(&self) -> DisposeReport {
        dispose::dispose_all(self.cache())
    }

    /// Disposes this preloader's namespace; without one, everything.
    pub fn dispose_game(&self) -> DisposeReport {
        match self.executor.loader().namespace() {
            Some(game) => dispose::dispose_game(self.cache(), game),
            None => self.dispose_all(),
        }
    }

    /// Enters `Running` unless already there, resetting per-run state.
    fn begin(&self, total: usize) -> bool {
        {
            let mut state = self.state.write();
            if *state == PreloadState::Running {
                return false;
            }
            *state = PreloadState::Running;
        }
        self.abort.reset();
        self.executor.failed().clear();
        *self.progress.write() = PreloadProgress::new(total);
        true
    }

    fn cancel(&self) -> PreloadReport {
        let (loaded, total) = {
            let progress = self.progress.read();
            (progress.loaded_count, progress.total_count)
        };
        *self.state.write() = PreloadState::Aborted;
        info!(loaded, total, "preload cancelled");
        self.sink.emit(PreloadEvent::Cancelled { loaded, total });

        PreloadReport {
            status: RunStatus::Cancelled,
            loaded,
            total,
            failed: self.failed_assets(),
        }
    }
}

/// Ends a run that is still `Running` when the preload future goes away
struct RunGuard<'a> {
    state: &'a RwLock<PreloadState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.write();
        if *state == PreloadState::Running {
            *state = PreloadState::Aborted;
            warn!("preload dropped before finishing");
        }
    }
}
