// Stream fetching over HTTP with byte-range windows

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::errors::Result;
use super::models::StreamDescriptor;

/// Default range window, 9 MiB
pub const DEFAULT_RANGE_CHUNK_BYTES: u64 = 9 * 1024 * 1024;

/// Downloads one stream to a file.
///
/// `on_progress` is called after every received chunk with the number of
/// bytes still remaining for this stream.
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        path: &Path,
        on_progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<u64>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    range_chunk_bytes: u64,
}

impl HttpFetcher {
    pub fn new(proxy: Option<&str>, range_chunk_bytes: u64) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(30));
        if let Some(proxy_url) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
            range_chunk_bytes: range_chunk_bytes.max(1),
        })
    }

    fn request(&self, stream: &StreamDescriptor) -> reqwest::RequestBuilder {
        stream
            .handle
            .headers
            .iter()
            .fold(self.client.get(&stream.handle.url), |req, (k, v)| req.header(k, v))
    }

    /// Writes a response body to `file`, returning the number of bytes written.
    async fn drain(
        response: reqwest::Response,
        file: &mut tokio::fs::File,
        written: &mut u64,
        total: u64,
        on_progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<u64> {
        let start = *written;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            *written += chunk.len() as u64;
            on_progress(total.saturating_sub(*written));
        }
        Ok(*written - start)
    }
}

#[async_trait]
impl StreamFetcher for HttpFetcher {
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        path: &Path,
        on_progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<u64> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        let mut total = stream.size;

        if total == 0 {
            let response = self.request(stream).send().await?.error_for_status()?;
            total = response.content_length().unwrap_or(0);
            Self::drain(response, &mut file, &mut written, total, on_progress).await?;
        } else {
            while written < total {
                let end = (written + self.range_chunk_bytes).min(total) - 1;
                log::debug!("[HttpFetcher] {} bytes={}-{}", stream.id, written, end);

                let response = self
                    .request(stream)
                    .header(RANGE, format!("bytes={}-{}", written, end))
                    .send()
                    .await?
                    .error_for_status()?;

                if response.status() == StatusCode::OK {
                    // Range ignored: the whole body follows
                    file.set_len(0).await?;
                    file.seek(SeekFrom::Start(0)).await?;
                    written = 0;
                    total = response.content_length().unwrap_or(total);
                    Self::drain(response, &mut file, &mut written, total, on_progress).await?;
                    break;
                }

                if let Some(actual) = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(content_range_total)
                {
                    total = actual;
                }

                let received =
                    Self::drain(response, &mut file, &mut written, total, on_progress).await?;
                if received == 0 {
                    break;
                }
            }
        }

        file.flush().await?;
        Ok(written)
    }
}

/// Total length from a `Content-Range: bytes a-b/TOTAL` header
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}
