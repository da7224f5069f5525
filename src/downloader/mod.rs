// Downloader module - selection, fetch, mux and background tasks

pub mod errors;
pub mod extractors;
pub mod fetch;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod session;
pub mod task;
pub mod tools;
pub mod utils;

pub use errors::{DownloadError, Result};
pub use extractors::{CliInfoExtractor, ExtractorConfig, FailureReason, InfoExtractor};
pub use fetch::{HttpFetcher, StreamFetcher};
pub use format_selector::StreamSelector;
pub use models::{
    Container, ContentReference, DownloadOutcome, DownloadRequest, DownloadTarget, FetchPlan,
    MediaKind, PlaylistReference, Resolution, ResolutionRequest, StreamDescriptor,
};
pub use orchestrator::Downloader;
pub use session::{default_resolutions, Session, UrlStatus};
pub use task::{DownloadTask, TaskState};
pub use tools::{FfmpegMuxer, Muxer, ToolManager, ToolType};
