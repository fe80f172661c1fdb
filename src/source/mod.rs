//! Byte transports
//!
//! The engine never interprets locators itself; an [`AssetSource`] turns a
//! locator into bytes. Retry and caching live above this seam.

pub mod file;
#[cfg(feature = "source-http")]
pub mod http;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub use file::FileSource;
#[cfg(feature = "source-http")]
pub use http::HttpSource;
pub use mock::MockSource;

/// Fetches the raw bytes behind a locator
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch everything at `locator`.
    async fn fetch(&self, locator: &str) -> Result<Bytes>;

    /// Get the name of this source (for debugging)
    fn source_name(&self) -> &'static str;
}
