// Orchestrator: executes fetch plans and playlist jobs
//
// Combined plan  -> fetch straight into the destination
// Separate plan  -> video then audio into scratch, mux, drop intermediates,
//                   move the muxed file into the destination
// Playlist       -> every item resolved and downloaded in order; failures skipped

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::errors::{DownloadError, Result};
use super::extractors::InfoExtractor;
use super::fetch::StreamFetcher;
use super::format_selector::StreamSelector;
use super::models::{
    Container, ContentReference, DownloadOutcome, DownloadRequest, DownloadTarget, FetchPlan,
    PlaylistReference, ResolutionRequest,
};
use super::progress::ProgressTracker;
use super::tools::Muxer;
use super::utils::{ensure_dir_exists, move_file};

/// Receives the overall percentage (0-100) of the running job
pub type ProgressSink<'a> = &'a mut (dyn FnMut(f64) + Send);

#[derive(Clone)]
pub struct Downloader {
    extractor: Arc<dyn InfoExtractor>,
    fetcher: Arc<dyn StreamFetcher>,
    muxer: Option<Arc<dyn Muxer>>,
    selector: StreamSelector,
    scratch_dir: PathBuf,
}

impl Downloader {
    /// Adaptive streams are only considered when a muxer is supplied.
    pub fn new(
        extractor: Arc<dyn InfoExtractor>,
        fetcher: Arc<dyn StreamFetcher>,
        muxer: Option<Arc<dyn Muxer>>,
        container: Container,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        let selector = StreamSelector::new(muxer.is_some(), container);
        Self {
            extractor,
            fetcher,
            muxer,
            selector,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn extractor(&self) -> &dyn InfoExtractor {
        self.extractor.as_ref()
    }

    pub fn selector(&self) -> &StreamSelector {
        &self.selector
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Runs one job. `job_id` namespaces the scratch files of this run.
    pub async fn run(
        &self,
        request: &DownloadRequest,
        job_id: &str,
        on_progress: ProgressSink<'_>,
    ) -> Result<DownloadOutcome> {
        match &request.target {
            DownloadTarget::Content(content) => {
                let file = self
                    .download_content(
                        content,
                        request.resolution,
                        &request.destination,
                        job_id,
                        on_progress,
                    )
                    .await?;
                Ok(DownloadOutcome {
                    files: vec![file],
                    items_completed: 1,
                    items_total: 1,
                })
            }
            DownloadTarget::Playlist(playlist) => Ok(self
                .download_playlist(
                    playlist,
                    request.resolution,
                    &request.destination,
                    job_id,
                    on_progress,
                )
                .await),
        }
    }

    /// Select a plan for `content` and execute it. Returns the final file.
    pub async fn download_content(
        &self,
        content: &ContentReference,
        resolution: ResolutionRequest,
        destination: &Path,
        job_id: &str,
        on_progress: ProgressSink<'_>,
    ) -> Result<PathBuf> {
        let plan = self.selector.select(resolution, &content.streams)?;
        log::info!(
            "[Downloader] {} -> {} ({})",
            content.title,
            plan.resolution().map_or_else(|| "audio".to_string(), |r| r.to_string()),
            if plan.needs_mux() { "video+audio" } else { "combined" }
        );
        self.execute_plan(&plan, &content.title, destination, job_id, on_progress)
            .await
    }

    pub async fn execute_plan(
        &self,
        plan: &FetchPlan,
        title: &str,
        destination: &Path,
        job_id: &str,
        on_progress: ProgressSink<'_>,
    ) -> Result<PathBuf> {
        ensure_dir_exists(destination).await?;
        ensure_dir_exists(&self.scratch_dir).await?;

        let mut tracker = ProgressTracker::for_plan(plan);

        match plan {
            FetchPlan::Combined(stream) => {
                let path = destination.join(stream.default_filename(title));
                self.fetcher
                    .fetch(stream, &path, &mut |remaining| on_progress(tracker.update(remaining)))
                    .await?;
                log::info!("[Downloader] Saved {}", path.display());
                Ok(path)
            }
            FetchPlan::Separate { video, audio } => {
                let muxer = self
                    .muxer
                    .as_ref()
                    .ok_or_else(|| DownloadError::ToolNotFound("ffmpeg".to_string()))?;

                let name = video.default_filename(title);
                let video_path = self.scratch_dir.join(format!("video-{}-{}", job_id, name));
                let audio_path = self
                    .scratch_dir
                    .join(format!("audio-{}-{}", job_id, audio.default_filename(title)));
                let muxed_path = self.scratch_dir.join(format!("{}-{}", job_id, name));

                log::info!("[Downloader] Fetching video stream {}", video.id);
                self.fetcher
                    .fetch(video, &video_path, &mut |remaining| {
                        on_progress(tracker.update(remaining))
                    })
                    .await?;

                tracker.start_audio();
                log::info!("[Downloader] Fetching audio stream {}", audio.id);
                self.fetcher
                    .fetch(audio, &audio_path, &mut |remaining| {
                        on_progress(tracker.update(remaining))
                    })
                    .await?;

                muxer.mux(&video_path, &audio_path, &muxed_path).await?;

                tokio::fs::remove_file(&video_path).await?;
                tokio::fs::remove_file(&audio_path).await?;

                let path = destination.join(&name);
                move_file(&muxed_path, &path).await?;
                log::info!("[Downloader] Saved {}", path.display());
                Ok(path)
            }
        }
    }

    /// Best effort: an item that fails to resolve, select or fetch is skipped.
    /// Progress is the fraction of items processed.
    pub async fn download_playlist(
        &self,
        playlist: &PlaylistReference,
        resolution: ResolutionRequest,
        destination: &Path,
        job_id: &str,
        on_progress: ProgressSink<'_>,
    ) -> DownloadOutcome {
        let total = playlist.urls.len();
        let mut outcome = DownloadOutcome {
            items_total: total,
            ..Default::default()
        };

        for (index, url) in playlist.urls.iter().enumerate() {
            log::info!("[Downloader] Playlist item {}/{}: {}", index + 1, total, url);

            match self.download_item(url, resolution, destination, job_id).await {
                Ok(file) => {
                    outcome.files.push(file);
                    outcome.items_completed += 1;
                }
                Err(e) => log::warn!("[Downloader] Skipping {}: {}", url, e),
            }

            on_progress((index + 1) as f64 / total as f64 * 100.0);
        }

        outcome
    }

    async fn download_item(
        &self,
        url: &str,
        resolution: ResolutionRequest,
        destination: &Path,
        job_id: &str,
    ) -> Result<PathBuf> {
        let content = self.extractor.resolve(url).await?;
        self.download_content(&content, resolution, destination, job_id, &mut |_| {})
            .await
    }
}
