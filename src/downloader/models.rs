// Common data models for the download pipeline

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::errors::DownloadError;
use super::utils::sanitize_filename;

/// Menu label for [`ResolutionRequest::Highest`]
pub const HIGHEST_AVAILABLE: &str = "Highest available";

/// Vertical resolution of a video stream, rendered as `"<height>p"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resolution(u32);

impl Resolution {
    pub fn new(height: u32) -> Self {
        Self(height)
    }

    pub fn height(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}

impl FromStr for Resolution {
    type Err = DownloadError;

    /// Accepts "720p", "1080p60" and bare heights like "480".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static::lazy_static! {
            static ref RESOLUTION_RE: Regex = Regex::new(r"^\s*(\d+)(?:p\d*)?\s*$").unwrap();
        }

        RESOLUTION_RE
            .captures(s)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .map(Self)
            .ok_or_else(|| DownloadError::ParseError(format!("Invalid resolution label: {}", s)))
    }
}

/// What the user asked for: a specific resolution or whatever is best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionRequest {
    #[default]
    Highest,
    Exact(Resolution),
}

impl fmt::Display for ResolutionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highest => write!(f, "{}", HIGHEST_AVAILABLE),
            Self::Exact(res) => write!(f, "{}", res),
        }
    }
}

impl FromStr for ResolutionRequest {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "highest available" | "highest" | "best" => Ok(Self::Highest),
            other => other.parse().map(Self::Exact),
        }
    }
}

/// Which elementary streams a descriptor carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// Progressive stream: video and audio together
    Combined,
    /// Adaptive video track
    VideoOnly,
    /// Adaptive audio track
    AudioOnly,
}

/// Container family of a stream (the "subtype")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Mp4,
    WebM,
    Other(String),
}

impl Container {
    /// Map a file extension onto its container family. `m4a` audio is mp4.
    pub fn from_ext(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp4" | "m4a" | "m4v" => Self::Mp4,
            "webm" | "weba" => Self::WebM,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp4 => write!(f, "mp4"),
            Self::WebM => write!(f, "webm"),
            Self::Other(ext) => write!(f, "{}", ext),
        }
    }
}

/// Opaque handle the fetcher needs to retrieve a stream's bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchHandle {
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

/// One fetchable variant of a piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Extractor format id (e.g. "137", "140")
    pub id: String,
    /// None for audio-only streams
    pub resolution: Option<Resolution>,
    pub kind: MediaKind,
    pub container: Container,
    /// File extension as reported by the extractor (mp4, m4a, webm)
    pub extension: String,
    /// Approximate size in bytes, 0 when unknown
    pub size: u64,
    /// Audio bitrate in kbps
    pub audio_bitrate: Option<f32>,
    pub handle: FetchHandle,
}

impl StreamDescriptor {
    pub fn is_combined(&self) -> bool {
        self.kind == MediaKind::Combined
    }

    pub fn is_video_only(&self) -> bool {
        self.kind == MediaKind::VideoOnly
    }

    pub fn is_audio_only(&self) -> bool {
        self.kind == MediaKind::AudioOnly
    }

    /// `<sanitized title>.<ext>`
    pub fn default_filename(&self, title: &str) -> String {
        format!("{}.{}", sanitize_filename(title), self.extension)
    }
}

/// A resolved piece of remote content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentReference {
    pub id: String,
    pub url: String,
    pub title: String,
    pub streams: Vec<StreamDescriptor>,
}

/// A playlist snapshot: member URLs in source order, resolved lazily
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistReference {
    pub url: String,
    pub title: Option<String>,
    pub urls: Vec<String>,
}

/// Output of the stream selector
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPlan {
    Combined(StreamDescriptor),
    Separate {
        video: StreamDescriptor,
        audio: StreamDescriptor,
    },
}

impl FetchPlan {
    pub fn needs_mux(&self) -> bool {
        matches!(self, Self::Separate { .. })
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match self {
            Self::Combined(stream) => stream.resolution,
            Self::Separate { video, .. } => video.resolution,
        }
    }
}

/// What a task downloads
#[derive(Debug, Clone)]
pub enum DownloadTarget {
    Content(ContentReference),
    Playlist(PlaylistReference),
}

/// A user-submitted download job
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub target: DownloadTarget,
    pub resolution: ResolutionRequest,
    pub destination: PathBuf,
}

/// Result of a finished orchestrator run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadOutcome {
    /// Final files placed in the destination directory
    pub files: Vec<PathBuf>,
    pub items_completed: usize,
    pub items_total: usize,
}
