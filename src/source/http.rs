//! HTTP GET source

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

use super::AssetSource;

/// Fetches absolute URLs, or paths joined onto a base URL
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, locator: &str) -> String {
        if locator.contains("://") || self.base_url.is_empty() {
            locator.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                locator.trim_start_matches('/')
            )
        }
    }
}

#[async_trait]
impl AssetSource for HttpSource {
    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        let url = self.url_for(locator);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        debug!("http fetch {} status={}", url, status.as_u16());
        if !status.is_success() {
            warn!("http fetch failed {} status={}", url, status.as_u16());
            return Err(anyhow!("GET {} returned {}", url, status));
        }
        Ok(resp.bytes().await?)
    }

    fn source_name(&self) -> &'static str {
        "Http"
    }
}
