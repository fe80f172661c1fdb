//! archetype_preload - Asset loading and caching engine for game clients
//!
//! # Features
//! - Ref-counted asset cache with LRU eviction under a memory budget
//! - In-flight de-duplication of concurrent loads
//! - Packed-atlas parsing with per-frame cache entries and an alias index
//! - Fetch-and-retry execution with fixed back-off
//! - Phased preloading with progress events and cooperative abort
//! - Per-game disposal through cache namespaces
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_preload::{EngineConfig, FileSource, PreloadManifest, Preloader, TokioRuntime};
//!
//! let config = EngineConfig::from_json_str(r#"{ "game": "slots", "version": "1.4.0" }"#)?;
//! let preloader = Preloader::from_config(&config, Arc::new(FileSource::new("assets")), TokioRuntime::new());
//! let report = preloader.preload_default(&PreloadManifest::from_json_str(manifest_json)?).await?;
//! let reel = preloader.get_frame("symbols", "cherry");
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: Enable the Tokio runtime adapter and tokio file reads
//! - `source-http`: Enable the reqwest-backed HTTP source

// Core modules
pub mod atlas;
pub mod cache;
pub mod loader;
pub mod preload;
pub mod runtime;
pub mod source;

// Support modules
pub mod config;
pub mod dispose;
pub mod resolver;
pub mod resource;
pub mod texture;

// Error types
mod error;
pub use error::{AssetError, Result};

// Re-export main types from cache
pub use cache::metrics::{AssetMetrics, AssetMetricsHandle};
pub use cache::{AssetCache, CacheStats, EntryInfo};

// Re-export configuration
pub use config::{CacheConfig, EngineConfig, PreloadOptions};

// Re-export atlas types
pub use atlas::{AtlasDescriptor, AtlasParser, FrameRect, ParsedAtlas};

// Re-export resource types
pub use resource::{AudioClip, FontFace, FrameImage, Resource, ResourceHandle, SkeletonPackage, StructuredData};
pub use texture::{Texture, TextureError, TextureFormat, TextureLoader};

// Re-export loading types
pub use loader::{AssetLoader, FailedAssets, FetchExecutor, LoadOutcome};
pub use resolver::{PathResolver, PrefixResolver};
#[cfg(feature = "source-http")]
pub use source::HttpSource;
pub use source::{AssetSource, FileSource, MockSource};

// Re-export runtime types
pub use runtime::MockRuntime;
#[cfg(feature = "runtime-tokio")]
pub use runtime::TokioRuntime;
pub use runtime::{AsyncRuntime, JoinHandle};

// Re-export preload types
pub use dispose::{dispose_all, dispose_game, DisposeReport};
pub use preload::{
    AbortHandle, AssetDescriptor, AssetKind, ChannelSink, EventSink, NullSink, PreloadEvent,
    PreloadManifest, PreloadProgress, PreloadReport, PreloadState, Preloader, RecordingSink,
    RunStatus,
};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
