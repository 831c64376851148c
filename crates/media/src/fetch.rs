//! Resolving image references from chat messages into raw bytes.
//!
//! Hosts hand us either a URL, a local file (with or without `file://`), or an
//! inline `base64://` payload.

use std::time::Duration;

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    tracing::debug,
};

use crate::error::{Context, Error, Result};

/// Something that can turn an image reference into bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>>;
}

/// Default resolver: HTTP(S) via reqwest, plus local files and base64.
#[derive(Debug, Clone, Default)]
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver whose HTTP requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::external("failed to build HTTP client", e))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", "gemexp")
            .send()
            .await
            .map_err(|e| Error::external(format!("failed to fetch {url}"), e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::external(format!("failed to read body of {url}"), e))?;
        debug!(url, bytes = bytes.len(), "fetched image");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        let source = source.trim();
        if source.is_empty() {
            return Err(Error::invalid_input("empty image source"));
        }

        if source.starts_with("http://") || source.starts_with("https://") {
            return self.fetch_http(source).await;
        }

        if let Some(payload) = source.strip_prefix("base64://") {
            return BASE64
                .decode(payload.trim())
                .context("invalid base64 image payload");
        }

        let path = source.strip_prefix("file://").unwrap_or(source);
        let data = tokio::fs::read(path).await?;
        debug!(path, bytes = data.len(), "read image file");
        Ok(data)
    }
}
