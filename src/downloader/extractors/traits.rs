// InfoExtractor trait and extractor configuration

use async_trait::async_trait;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{ContentReference, PlaylistReference};

/// Configuration for info extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Subprocess timeout in seconds
    pub timeout_seconds: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_seconds: 60,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Resolves URLs into stream metadata. Retry and error behaviour belong to
/// the implementation.
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Resolve a single content URL into its available streams
    async fn resolve(&self, url: &str) -> Result<ContentReference, DownloadError>;

    /// Resolve a playlist URL into its member URLs, in source order
    async fn resolve_playlist(&self, url: &str) -> Result<PlaylistReference, DownloadError>;
}
