use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::downloader::fetch::DEFAULT_RANGE_CHUNK_BYTES;
use crate::downloader::tools::ToolInfo;
use crate::downloader::{
    CliInfoExtractor, Container, DownloadError, Downloader, ExtractorConfig, FfmpegMuxer,
    HttpFetcher, Muxer, Result, Session, ToolManager, ToolType,
};

/// User configuration, stored as JSON
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub destination: PathBuf,
    /// Intermediate files of adaptive downloads, relative to the working dir
    pub scratch_dir: PathBuf,
    pub ffmpeg_path: Option<String>,
    pub ytdlp_path: Option<String>,
    pub preferred_container: String,
    pub range_chunk_bytes: u64,
    pub extractor_timeout_seconds: u32,
    pub proxy: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            destination: dirs::download_dir().unwrap_or_else(|| PathBuf::from("./downloads")),
            scratch_dir: PathBuf::from("tmp"),
            ffmpeg_path: None,
            ytdlp_path: None,
            preferred_container: "mp4".to_string(),
            range_chunk_bytes: DEFAULT_RANGE_CHUNK_BYTES,
            extractor_timeout_seconds: 60,
            proxy: None,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the default location. A missing file is created
    /// with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content).map_err(|e| {
                DownloadError::Config(format!("{}: {}", config_path.display(), e))
            })
        } else {
            let config = AppConfig::default();
            config.save(&config_path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DownloadError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DownloadError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("minytd").join("config.json"))
    }

    pub fn container(&self) -> Container {
        Container::from_ext(&self.preferred_container)
    }
}

/// Startup configuration with tool detection already done
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub destination: PathBuf,
    pub scratch_dir: PathBuf,
    pub container: Container,
    pub range_chunk_bytes: u64,
    pub extractor: ExtractorConfig,
    pub ffmpeg: ToolInfo,
    pub ytdlp: ToolInfo,
}

impl RuntimeConfig {
    pub fn resolve(config: &AppConfig) -> Self {
        let tools = ToolManager::new();
        let ffmpeg = tools.get_tool_info(ToolType::Ffmpeg, config.ffmpeg_path.as_deref());
        let ytdlp = tools.get_tool_info(ToolType::YtDlp, config.ytdlp_path.as_deref());

        Self {
            destination: config.destination.clone(),
            scratch_dir: config.scratch_dir.clone(),
            container: config.container(),
            range_chunk_bytes: config.range_chunk_bytes,
            extractor: ExtractorConfig::default()
                .with_proxy(config.proxy.clone())
                .with_timeout(config.extractor_timeout_seconds),
            ffmpeg,
            ytdlp,
        }
    }

    pub fn mux_available(&self) -> bool {
        self.ffmpeg.is_available
    }

    /// Wires the yt-dlp extractor, HTTP fetcher and (if present) ffmpeg
    pub fn build_session(&self) -> Result<Session> {
        let ytdlp_path = self
            .ytdlp
            .path
            .clone()
            .ok_or_else(|| DownloadError::ToolNotFound("yt-dlp".to_string()))?;

        let extractor = CliInfoExtractor::new(ytdlp_path, self.extractor.clone());
        let fetcher = HttpFetcher::new(self.extractor.proxy.as_deref(), self.range_chunk_bytes)?;
        let muxer = self
            .ffmpeg
            .path
            .as_ref()
            .filter(|_| self.ffmpeg.is_available)
            .map(|path| Arc::new(FfmpegMuxer::new(path.clone())) as Arc<dyn Muxer>);

        Ok(Session::new(Downloader::new(
            Arc::new(extractor),
            Arc::new(fetcher),
            muxer,
            self.container.clone(),
            self.scratch_dir.clone(),
        )))
    }
}
