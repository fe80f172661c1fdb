//! Filesystem source

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;

use super::AssetSource;

/// Reads locators as paths relative to a root directory
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn path_for(&self, locator: &str) -> PathBuf {
        let relative = locator.strip_prefix("file://").unwrap_or(locator);
        self.root.join(relative.trim_start_matches('/'))
    }
}

#[async_trait]
impl AssetSource for FileSource {
    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        let path = self.path_for(locator);

        #[cfg(feature = "runtime-tokio")]
        let data = tokio::fs::read(&path).await;
        #[cfg(not(feature = "runtime-tokio"))]
        let data = std::fs::read(&path);

        let data = data.with_context(|| format!("reading {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    fn source_name(&self) -> &'static str {
        "File"
    }
}
