// Session - the front end's entry point
//
// Validates URLs, offers the resolution menu and builds tasks. Everything
// host-dependent (muxer presence, directories) comes in through the
// Downloader built at startup.

use super::errors::Result;
use super::extractors::{diagnose_error, FailureReason};
use super::models::{
    ContentReference, DownloadRequest, DownloadTarget, PlaylistReference, Resolution,
    ResolutionRequest,
};
use super::orchestrator::Downloader;
use super::task::DownloadTask;
use super::utils::is_playlist_url;

/// Outcome of validating a user-entered URL
#[derive(Debug, Clone)]
pub enum UrlStatus {
    Ready {
        content: ContentReference,
        is_playlist: bool,
        /// Resolutions actually offered by this content, highest first
        resolutions: Vec<Resolution>,
    },
    /// Not a content URL at all
    Invalid,
    /// Looked like content but could not be resolved
    Unavailable { reason: FailureReason, message: String },
}

/// Default resolution menu for a host with or without a muxer
pub fn default_resolutions(mux_available: bool) -> Vec<ResolutionRequest> {
    let heights: &[u32] = if mux_available {
        &[2160, 1440, 1080, 720, 480, 360, 144]
    } else {
        &[720, 480, 360, 144]
    };

    let exact = heights
        .iter()
        .map(|h| ResolutionRequest::Exact(Resolution::new(*h)));

    if mux_available {
        std::iter::once(ResolutionRequest::Highest).chain(exact).collect()
    } else {
        exact.collect()
    }
}

pub struct Session {
    downloader: Downloader,
}

impl Session {
    pub fn new(downloader: Downloader) -> Self {
        Self { downloader }
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn mux_available(&self) -> bool {
        self.downloader.selector().mux_available()
    }

    pub async fn validate_url(&self, url: &str) -> UrlStatus {
        let url = url.trim();
        match self.downloader.extractor().resolve(url).await {
            Ok(content) => {
                let resolutions = self
                    .downloader
                    .selector()
                    .available_resolutions(&content.streams);
                UrlStatus::Ready {
                    is_playlist: is_playlist_url(url),
                    resolutions,
                    content,
                }
            }
            Err(e) if e.is_invalid_url() => {
                log::debug!("[Session] Not a content URL: {}", url);
                UrlStatus::Invalid
            }
            Err(e) => {
                let message = e.to_string();
                let reason = diagnose_error(&message);
                log::warn!("[Session] {} ({}): {}", reason.description(), url, message);
                UrlStatus::Unavailable { reason, message }
            }
        }
    }

    pub fn resolution_choices(&self) -> Vec<ResolutionRequest> {
        default_resolutions(self.mux_available())
    }

    pub async fn resolve_playlist(&self, url: &str) -> Result<PlaylistReference> {
        self.downloader.extractor().resolve_playlist(url.trim()).await
    }

    /// Builds a task for `request` without starting it
    pub fn create_task(&self, request: DownloadRequest) -> DownloadTask {
        let title = match &request.target {
            DownloadTarget::Content(content) => content.title.clone(),
            DownloadTarget::Playlist(playlist) => format!(
                "Playlist-{}",
                playlist.title.as_deref().unwrap_or(&playlist.url)
            ),
        };
        DownloadTask::new(self.downloader.clone(), request, title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::DownloadError;
    use crate::downloader::extractors::InfoExtractor;
    use crate::downloader::fetch::StreamFetcher;
    use crate::downloader::models::{Container, FetchHandle, MediaKind, StreamDescriptor};
    use crate::downloader::tools::Muxer;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;

    struct ScriptedExtractor;

    #[async_trait]
    impl InfoExtractor for ScriptedExtractor {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn resolve(&self, url: &str) -> Result<ContentReference> {
            if url.contains("ratelimited") {
                return Err(DownloadError::from(
                    "ERROR: HTTP Error 429: Too Many Requests".to_string(),
                ));
            }
            if !url.starts_with("https://video.example/") {
                return Err(DownloadError::InvalidUrl(url.to_string()));
            }
            let stream = |id: &str, kind, height: Option<u32>| StreamDescriptor {
                id: id.to_string(),
                resolution: height.map(Resolution::new),
                kind,
                container: Container::Mp4,
                extension: "mp4".to_string(),
                size: 10,
                audio_bitrate: None,
                handle: FetchHandle {
                    url: format!("https://cdn.example/{}", id),
                    headers: Vec::new(),
                },
            };
            Ok(ContentReference {
                id: "abc".to_string(),
                url: url.to_string(),
                title: "Clip".to_string(),
                streams: vec![
                    stream("18", MediaKind::Combined, Some(360)),
                    stream("137", MediaKind::VideoOnly, Some(1080)),
                ],
            })
        }

        async fn resolve_playlist(&self, url: &str) -> Result<PlaylistReference> {
            Ok(PlaylistReference {
                url: url.to_string(),
                title: Some("Mix".to_string()),
                urls: Vec::new(),
            })
        }
    }

    struct NoFetch;

    #[async_trait]
    impl StreamFetcher for NoFetch {
        async fn fetch(
            &self,
            _stream: &StreamDescriptor,
            _path: &Path,
            _on_progress: &mut (dyn FnMut(u64) + Send),
        ) -> Result<u64> {
            Ok(0)
        }
    }

    struct NoMux;

    #[async_trait]
    impl Muxer for NoMux {
        async fn mux(&self, _video: &Path, _audio: &Path, _output: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn session(with_muxer: bool) -> Session {
        let muxer = with_muxer.then(|| Arc::new(NoMux) as Arc<dyn Muxer>);
        Session::new(Downloader::new(
            Arc::new(ScriptedExtractor),
            Arc::new(NoFetch),
            muxer,
            Container::Mp4,
            "tmp",
        ))
    }

    #[tokio::test]
    async fn test_ready_url() {
        let status = session(true)
            .validate_url(" https://video.example/watch?v=abc&list=PL1 ")
            .await;
        match status {
            UrlStatus::Ready {
                content,
                is_playlist,
                resolutions,
            } => {
                assert_eq!(content.title, "Clip");
                assert!(is_playlist);
                assert_eq!(resolutions, vec![Resolution::new(1080), Resolution::new(360)]);
            }
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolutions_without_muxer_are_progressive_only() {
        let status = session(false)
            .validate_url("https://video.example/watch?v=abc")
            .await;
        match status {
            UrlStatus::Ready { resolutions, is_playlist, .. } => {
                assert!(!is_playlist);
                assert_eq!(resolutions, vec![Resolution::new(360)]);
            }
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_url_resets_silently() {
        let status = session(true).validate_url("not a url").await;
        assert!(matches!(status, UrlStatus::Invalid));
    }

    #[tokio::test]
    async fn test_unexpected_failure_suggests_retry() {
        let status = session(true)
            .validate_url("https://video.example/ratelimited")
            .await;
        match status {
            UrlStatus::Unavailable { reason, .. } => {
                assert_eq!(reason, FailureReason::RateLimited);
                assert_eq!(reason.suggestion(), "Please try again later.");
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_resolution_menu() {
        let labels: Vec<String> = session(true)
            .resolution_choices()
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(
            labels,
            vec!["Highest available", "2160p", "1440p", "1080p", "720p", "480p", "360p", "144p"]
        );

        let labels: Vec<String> = default_resolutions(false)
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(labels, vec!["720p", "480p", "360p", "144p"]);
    }

    #[tokio::test]
    async fn test_playlist_task_title() {
        let session = session(false);
        let playlist = session
            .resolve_playlist("https://video.example/playlist?list=PL1")
            .await
            .unwrap();
        let task = session.create_task(DownloadRequest {
            target: DownloadTarget::Playlist(playlist),
            resolution: ResolutionRequest::Highest,
            destination: "downloads".into(),
        });
        assert_eq!(task.title(), "Playlist-Mix");
        assert_eq!(task.get_progress(), 0.0);
    }
}
