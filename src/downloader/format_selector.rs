// StreamSelector - chooses which stream(s) to fetch for a resolution request
//
// Rules:
// - Without a muxer only combined (progressive) streams are candidates
// - Exact request: combined at that resolution, else video-only at that
//   resolution + best audio, else fall back to "highest available"
// - Highest available: best combined vs best video-only, ties go to combined
// - Audio is always the highest-bitrate audio-only stream

use std::cmp::Ordering;

use super::errors::{DownloadError, Result};
use super::models::{Container, FetchPlan, Resolution, ResolutionRequest, StreamDescriptor};

/// Selection policy resolved once at startup
#[derive(Debug, Clone)]
pub struct StreamSelector {
    mux_available: bool,
    container: Container,
}

impl StreamSelector {
    pub fn new(mux_available: bool, container: Container) -> Self {
        Self {
            mux_available,
            container,
        }
    }

    pub fn mux_available(&self) -> bool {
        self.mux_available
    }

    /// Choose a fetch plan, falling back to the highest available streams
    /// when the exact resolution is missing.
    pub fn select(
        &self,
        request: ResolutionRequest,
        streams: &[StreamDescriptor],
    ) -> Result<FetchPlan> {
        if let ResolutionRequest::Exact(resolution) = request {
            if let Some(plan) = self.select_exact(resolution, streams) {
                return Ok(plan);
            }
            log::debug!(
                "[Selector] No {} stream, falling back to highest available",
                resolution
            );
        }
        self.select_highest(streams)
    }

    /// Exact-resolution plan, or None when neither kind matches
    pub fn select_exact(
        &self,
        resolution: Resolution,
        streams: &[StreamDescriptor],
    ) -> Option<FetchPlan> {
        if let Some(combined) = self
            .candidates(streams)
            .find(|s| s.is_combined() && s.resolution == Some(resolution))
        {
            return Some(FetchPlan::Combined(combined.clone()));
        }

        if !self.mux_available {
            return None;
        }

        let video = self
            .candidates(streams)
            .find(|s| s.is_video_only() && s.resolution == Some(resolution))?;
        let audio = self.best_audio(streams)?;
        Some(FetchPlan::Separate {
            video: video.clone(),
            audio: audio.clone(),
        })
    }

    /// Highest-resolution plan. Ties prefer the combined stream.
    pub fn select_highest(&self, streams: &[StreamDescriptor]) -> Result<FetchPlan> {
        let combined = self.best_combined(streams);
        let separate = if self.mux_available {
            self.best_video(streams).zip(self.best_audio(streams))
        } else {
            None
        };

        match (combined, separate) {
            (Some(c), Some((v, a))) => {
                if height(c) >= height(v) {
                    Ok(FetchPlan::Combined(c.clone()))
                } else {
                    Ok(FetchPlan::Separate {
                        video: v.clone(),
                        audio: a.clone(),
                    })
                }
            }
            (Some(c), None) => Ok(FetchPlan::Combined(c.clone())),
            (None, Some((v, a))) => Ok(FetchPlan::Separate {
                video: v.clone(),
                audio: a.clone(),
            }),
            (None, None) => Err(DownloadError::NoViableStream(format!(
                "{} container{}",
                self.container,
                if self.mux_available { "" } else { " (progressive only)" }
            ))),
        }
    }

    /// Distinct resolutions offered to the user, highest first. Every
    /// container counts; adaptive video only when a muxer is present.
    pub fn available_resolutions(&self, streams: &[StreamDescriptor]) -> Vec<Resolution> {
        let mut resolutions: Vec<Resolution> = streams
            .iter()
            .filter(|s| self.mux_available || s.is_combined())
            .filter_map(|s| s.resolution)
            .collect();
        resolutions.sort_unstable_by(|a, b| b.cmp(a));
        resolutions.dedup();
        resolutions
    }

    fn candidates<'a>(
        &'a self,
        streams: &'a [StreamDescriptor],
    ) -> impl Iterator<Item = &'a StreamDescriptor> + 'a {
        streams
            .iter()
            .filter(move |s| s.container == self.container)
            .filter(move |s| self.mux_available || s.is_combined())
    }

    fn best_combined<'a>(
        &'a self,
        streams: &'a [StreamDescriptor],
    ) -> Option<&'a StreamDescriptor> {
        self.candidates(streams)
            .filter(|s| s.is_combined())
            .max_by_key(|s| height(s))
    }

    fn best_video<'a>(
        &'a self,
        streams: &'a [StreamDescriptor],
    ) -> Option<&'a StreamDescriptor> {
        self.candidates(streams)
            .filter(|s| s.is_video_only())
            .max_by_key(|s| height(s))
    }

    fn best_audio<'a>(
        &'a self,
        streams: &'a [StreamDescriptor],
    ) -> Option<&'a StreamDescriptor> {
        self.candidates(streams)
            .filter(|s| s.is_audio_only())
            .max_by(|a, b| {
                let abr_a = a.audio_bitrate.unwrap_or(0.0);
                let abr_b = b.audio_bitrate.unwrap_or(0.0);
                abr_a.partial_cmp(&abr_b).unwrap_or(Ordering::Equal)
            })
    }
}

fn height(stream: &StreamDescriptor) -> u32 {
    stream.resolution.map_or(0, |r| r.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{FetchHandle, MediaKind};

    fn make_stream(
        id: &str,
        kind: MediaKind,
        height: Option<u32>,
        abr: Option<f32>,
    ) -> StreamDescriptor {
        let extension = if kind == MediaKind::AudioOnly { "m4a" } else { "mp4" };
        StreamDescriptor {
            id: id.to_string(),
            resolution: height.map(Resolution::new),
            kind,
            container: Container::Mp4,
            extension: extension.to_string(),
            size: 1_000,
            audio_bitrate: abr,
            handle: FetchHandle {
                url: format!("https://cdn.example/{}", id),
                headers: Vec::new(),
            },
        }
    }

    /// {1080p combined, 720p combined, 480p video-only, audio-only x2}
    fn sample_streams() -> Vec<StreamDescriptor> {
        vec![
            make_stream("22", MediaKind::Combined, Some(1080), None),
            make_stream("18", MediaKind::Combined, Some(720), None),
            make_stream("135", MediaKind::VideoOnly, Some(480), None),
            make_stream("139", MediaKind::AudioOnly, None, Some(48.0)),
            make_stream("140", MediaKind::AudioOnly, None, Some(128.0)),
        ]
    }

    fn exact(label: &str) -> ResolutionRequest {
        ResolutionRequest::Exact(label.parse().unwrap())
    }

    #[test]
    fn test_exact_combined_match() {
        let selector = StreamSelector::new(true, Container::Mp4);
        let plan = selector.select(exact("1080p"), &sample_streams()).unwrap();
        match plan {
            FetchPlan::Combined(stream) => assert_eq!(stream.id, "22"),
            other => panic!("expected combined plan, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_separate_match_uses_best_audio() {
        let selector = StreamSelector::new(true, Container::Mp4);
        let plan = selector.select(exact("480p"), &sample_streams()).unwrap();
        match plan {
            FetchPlan::Separate { video, audio } => {
                assert_eq!(video.id, "135");
                assert_eq!(audio.id, "140");
            }
            other => panic!("expected separate plan, got {:?}", other),
        }
    }

    #[test]
    fn test_without_muxer_falls_back_to_highest_combined() {
        let selector = StreamSelector::new(false, Container::Mp4);
        let plan = selector.select(exact("480p"), &sample_streams()).unwrap();
        assert_eq!(plan, FetchPlan::Combined(sample_streams()[0].clone()));
    }

    #[test]
    fn test_without_muxer_never_separate() {
        let selector = StreamSelector::new(false, Container::Mp4);
        let mut streams = sample_streams();
        streams.push(make_stream("137", MediaKind::VideoOnly, Some(2160), None));

        for request in [
            ResolutionRequest::Highest,
            exact("2160p"),
            exact("1080p"),
            exact("480p"),
            exact("144p"),
        ] {
            let plan = selector.select(request, &streams).unwrap();
            assert!(!plan.needs_mux(), "{} produced {:?}", request, plan);
        }
    }

    #[test]
    fn test_exact_combined_always_wins() {
        let selector = StreamSelector::new(true, Container::Mp4);
        let mut streams = sample_streams();
        streams.push(make_stream("136", MediaKind::VideoOnly, Some(720), None));
        streams.push(make_stream("137", MediaKind::VideoOnly, Some(1080), None));

        for label in ["1080p", "720p"] {
            let plan = selector.select(exact(label), &streams).unwrap();
            assert!(matches!(plan, FetchPlan::Combined(_)), "{}", label);
        }
    }

    #[test]
    fn test_highest_prefers_higher_adaptive() {
        let selector = StreamSelector::new(true, Container::Mp4);
        let mut streams = sample_streams();
        streams.push(make_stream("137", MediaKind::VideoOnly, Some(2160), None));

        let plan = selector.select(ResolutionRequest::Highest, &streams).unwrap();
        assert_eq!(plan.resolution(), Some(Resolution::new(2160)));
        assert!(plan.needs_mux());
    }

    #[test]
    fn test_highest_tie_prefers_combined() {
        let selector = StreamSelector::new(true, Container::Mp4);
        let mut streams = sample_streams();
        streams.push(make_stream("137", MediaKind::VideoOnly, Some(1080), None));

        let plan = selector.select(ResolutionRequest::Highest, &streams).unwrap();
        assert!(matches!(plan, FetchPlan::Combined(ref s) if s.id == "22"));
    }

    #[test]
    fn test_other_containers_are_ignored() {
        let selector = StreamSelector::new(true, Container::Mp4);
        let mut webm = make_stream("313", MediaKind::VideoOnly, Some(2160), None);
        webm.container = Container::WebM;
        let mut streams = sample_streams();
        streams.push(webm);

        let plan = selector.select(exact("2160p"), &streams).unwrap();
        assert_eq!(plan.resolution(), Some(Resolution::new(1080)));
    }

    #[test]
    fn test_no_candidates_is_selection_failure() {
        let selector = StreamSelector::new(false, Container::Mp4);
        let streams = vec![make_stream("140", MediaKind::AudioOnly, None, Some(128.0))];
        let err = selector.select(ResolutionRequest::Highest, &streams).unwrap_err();
        assert!(matches!(err, DownloadError::NoViableStream(_)));
    }

    #[test]
    fn test_available_resolutions() {
        let with_mux = StreamSelector::new(true, Container::Mp4);
        let labels: Vec<String> = with_mux
            .available_resolutions(&sample_streams())
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(labels, vec!["1080p", "720p", "480p"]);

        let without_mux = StreamSelector::new(false, Container::Mp4);
        assert_eq!(
            without_mux.available_resolutions(&sample_streams()),
            vec![Resolution::new(1080), Resolution::new(720)]
        );
    }
}
