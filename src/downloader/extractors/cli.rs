// CLI InfoExtractor - uses native `yt-dlp` binary
//
// Only metadata comes from yt-dlp. Bytes are fetched by HttpFetcher from the
// direct format URLs yt-dlp reports, so only plain http(s) formats are kept.

use async_trait::async_trait;
use serde_json::Value;

use super::traits::{ExtractorConfig, InfoExtractor};
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{
    Container, ContentReference, FetchHandle, MediaKind, PlaylistReference, Resolution,
    StreamDescriptor,
};
use crate::downloader::utils::run_output_with_timeout;

/// CLI-based info extractor using yt-dlp binary
pub struct CliInfoExtractor {
    ytdlp_path: String,
    config: ExtractorConfig,
}

impl CliInfoExtractor {
    pub fn new(ytdlp_path: impl Into<String>, config: ExtractorConfig) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            config,
        }
    }

    /// Common arguments for every invocation
    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.timeout_seconds.to_string(),
        ];

        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }

    async fn run(&self, mut args: Vec<String>, url: &str) -> Result<Vec<u8>, DownloadError> {
        args.push(url.to_string());
        log::debug!("[CliExtractor] {} {}", self.ytdlp_path, args.join(" "));

        let output = run_output_with_timeout(
            &self.ytdlp_path,
            args,
            self.config.timeout_seconds as u64,
        )
        .await?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::debug!("[CliExtractor] yt-dlp failed for {}: {}", url, stderr.trim());
            Err(DownloadError::from(stderr.trim().to_string()))
        }
    }

    /// Parse `--dump-json` output. A playlist page prints one document per
    /// entry (or a `_type: playlist` document) and is not a content URL.
    pub(crate) fn parse_json(
        stdout: &[u8],
        requested_url: &str,
    ) -> Result<ContentReference, DownloadError> {
        let mut documents = serde_json::Deserializer::from_slice(stdout).into_iter::<Value>();
        let json = documents
            .next()
            .ok_or_else(|| DownloadError::ParseError("Empty yt-dlp output".to_string()))?
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        if documents.next().is_some() || json["_type"].as_str() == Some("playlist") {
            return Err(DownloadError::InvalidUrl(format!(
                "Not a single video: {}",
                requested_url
            )));
        }

        let formats = json["formats"]
            .as_array()
            .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

        Ok(ContentReference {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            url: json["webpage_url"]
                .as_str()
                .unwrap_or(requested_url)
                .to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            streams: formats.iter().filter_map(Self::parse_format).collect(),
        })
    }

    fn parse_format(f: &Value) -> Option<StreamDescriptor> {
        let protocol = f["protocol"].as_str().unwrap_or("https");
        if protocol != "https" && protocol != "http" {
            return None;
        }
        let url = f["url"].as_str()?;

        let has_codec = |key: &str| f[key].as_str().map_or(false, |c| c != "none" && !c.is_empty());
        let kind = match (has_codec("vcodec"), has_codec("acodec")) {
            (true, true) => MediaKind::Combined,
            (true, false) => MediaKind::VideoOnly,
            (false, true) => MediaKind::AudioOnly,
            (false, false) => return None,
        };

        let resolution = match kind {
            MediaKind::AudioOnly => None,
            _ => f["height"]
                .as_u64()
                .and_then(|h| u32::try_from(h).ok())
                .map(Resolution::new),
        };

        let headers = f["http_headers"]
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let extension = f["ext"].as_str().unwrap_or("mp4").to_string();

        Some(StreamDescriptor {
            id: f["format_id"].as_str().unwrap_or("").to_string(),
            resolution,
            kind,
            container: Container::from_ext(&extension),
            extension,
            size: f["filesize"]
                .as_u64()
                .or_else(|| f["filesize_approx"].as_u64())
                .unwrap_or(0),
            audio_bitrate: f["abr"]
                .as_f64()
                .or_else(|| f["tbr"].as_f64())
                .map(|b| b as f32),
            handle: FetchHandle {
                url: url.to_string(),
                headers,
            },
        })
    }

    /// Parse `--flat-playlist --dump-single-json` output
    pub(crate) fn parse_playlist_json(
        stdout: &[u8],
        requested_url: &str,
    ) -> Result<PlaylistReference, DownloadError> {
        let json: Value = serde_json::from_slice(stdout)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        let entries = json["entries"]
            .as_array()
            .ok_or_else(|| {
                DownloadError::InvalidUrl(format!("Not a playlist: {}", requested_url))
            })?;

        let urls = entries
            .iter()
            .filter_map(|entry| {
                entry["url"]
                    .as_str()
                    .filter(|u| u.starts_with("http"))
                    .map(|u| u.to_string())
                    .or_else(|| {
                        entry["id"]
                            .as_str()
                            .map(|id| format!("https://www.youtube.com/watch?v={}", id))
                    })
            })
            .collect();

        Ok(PlaylistReference {
            url: requested_url.to_string(),
            title: json["title"].as_str().map(|s| s.to_string()),
            urls,
        })
    }
}

#[async_trait]
impl InfoExtractor for CliInfoExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn resolve(&self, url: &str) -> Result<ContentReference, DownloadError> {
        let mut args = vec!["--dump-json".to_string(), "--no-playlist".to_string()];
        args.extend(self.base_args());

        let stdout = self.run(args, url).await?;
        let content = Self::parse_json(&stdout, url)?;
        log::info!(
            "[CliExtractor] Resolved '{}' with {} fetchable streams",
            content.title,
            content.streams.len()
        );
        Ok(content)
    }

    async fn resolve_playlist(&self, url: &str) -> Result<PlaylistReference, DownloadError> {
        let mut args = vec![
            "--flat-playlist".to_string(),
            "--dump-single-json".to_string(),
        ];
        args.extend(self.base_args());

        let stdout = self.run(args, url).await?;
        let playlist = Self::parse_playlist_json(&stdout, url)?;
        log::info!(
            "[CliExtractor] Playlist {:?} has {} entries",
            playlist.title,
            playlist.urls.len()
        );
        Ok(playlist)
    }
}
