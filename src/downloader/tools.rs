// External tools: detection of ffmpeg / yt-dlp and the ffmpeg muxer

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};

use super::errors::{DownloadError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    Ffmpeg,
    YtDlp,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::YtDlp => "yt-dlp",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "-version",
            ToolType::YtDlp => "--version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    /// Locate a tool, trying `configured` first. A tool only counts as
    /// available if it answers its version probe.
    pub fn get_tool_info(&self, tool_type: ToolType, configured: Option<&str>) -> ToolInfo {
        let found = configured
            .and_then(|path| self.probe(path, tool_type).map(|v| (path.to_string(), v)))
            .or_else(|| self.detect_tool(tool_type));

        match found {
            Some((path, version)) => {
                log::info!("[Tools] {} {} at {}", tool_type.as_str(), version, path);
                ToolInfo {
                    tool_type,
                    version: Some(version),
                    path: Some(path),
                    is_available: true,
                }
            }
            None => {
                log::warn!("[Tools] {} not found", tool_type.as_str());
                ToolInfo {
                    tool_type,
                    version: None,
                    path: None,
                    is_available: false,
                }
            }
        }
    }

    fn detect_tool(&self, tool_type: ToolType) -> Option<(String, String)> {
        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            if Path::new(&path).exists() {
                if let Some(version) = self.probe(&path, tool_type) {
                    return Some((path, version));
                }
            }
        }

        // 2. Try PATH
        let locator = if cfg!(windows) { "where" } else { "which" };
        if let Ok(output) = Command::new(locator).arg(binary_name).output() {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if let Some(path) = stdout.lines().next().map(str::trim).filter(|p| !p.is_empty()) {
                    if let Some(version) = self.probe(path, tool_type) {
                        return Some((path.to_string(), version));
                    }
                }
            }
        }

        None
    }

    /// First line of the version output, if the binary runs
    fn probe(&self, path: &str, tool_type: ToolType) -> Option<String> {
        match Command::new(path)
            .arg(tool_type.version_arg())
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) if output.status.success() => Some(
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string(),
            ),
            _ => None,
        }
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines a video-only and an audio-only file into one container
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

pub struct FfmpegMuxer {
    ffmpeg_path: String,
}

impl FfmpegMuxer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn args(video: &Path, audio: &Path, output: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-i".into(),
            video.into(),
            "-i".into(),
            audio.into(),
            "-c".into(),
            "copy".into(),
            output.into(),
        ]
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        log::info!("[ffmpeg] Muxing into {}", output.display());

        // kill_on_drop: aborting the owning task must take ffmpeg down with it
        let result = tokio::process::Command::new(&self.ffmpeg_path)
            .args(Self::args(video, audio, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DownloadError::ToolNotFound(format!("{}: {}", self.ffmpeg_path, e)))?;

        if result.status.success() {
            Ok(())
        } else {
            log::debug!(
                "[ffmpeg] stderr: {}",
                String::from_utf8_lossy(&result.stderr).trim()
            );
            Err(DownloadError::MuxFailed {
                output: output.to_path_buf(),
                code: result.status.code(),
            })
        }
    }
}
