// Error types for resolution, selection, fetch and mux

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL does not point at any content the extractor understands
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL looked fine but resolution failed for another reason
    #[error("Content unavailable: {0}")]
    Unavailable(String),

    /// Neither the requested resolution nor the fallback had a candidate stream
    #[error("No downloadable stream available for {0}")]
    NoViableStream(String),

    /// yt-dlp or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ffmpeg exited with a non-zero status
    #[error("ffmpeg failed to mux {} (exit code {code:?})", output.display())]
    MuxFailed { output: PathBuf, code: Option<i32> },

    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    /// Whether this error means "not a content URL" rather than a transient failure.
    pub fn is_invalid_url(&self) -> bool {
        matches!(self, Self::InvalidUrl(_))
    }
}

// Classifies raw stderr from the extractor
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("is not a valid url")
            || lower.contains("unsupported url")
            || lower.contains("invalid url")
            || lower.contains("incomplete youtube id")
        {
            return Self::InvalidUrl(s);
        }

        if lower.contains("command not found") || lower.contains("no such file") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("json") || lower.contains("parse") {
            return Self::ParseError(s);
        }

        if lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("429")
            || lower.contains("unavailable")
            || lower.contains("private video")
            || lower.contains("403")
        {
            return Self::Unavailable(s);
        }

        Self::Unknown(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_url_is_invalid() {
        let err = DownloadError::from("ERROR: Unsupported URL: https://example.com".to_string());
        assert!(err.is_invalid_url());
    }

    #[test]
    fn test_not_a_url_is_invalid() {
        let err = DownloadError::from("ERROR: 'abc' is not a valid URL.".to_string());
        assert!(err.is_invalid_url());
    }

    #[test]
    fn test_timeout_is_unavailable() {
        let err = DownloadError::from("Timed out after 60s".to_string());
        assert!(matches!(err, DownloadError::Unavailable(_)));
    }

    #[test]
    fn test_unclassified_is_unknown() {
        let err = DownloadError::from("something odd".to_string());
        assert!(matches!(err, DownloadError::Unknown(_)));
        assert!(!err.is_invalid_url());
    }

    #[test]
    fn test_mux_failed_message() {
        let err = DownloadError::MuxFailed {
            output: PathBuf::from("tmp/out.mp4"),
            code: Some(1),
        };
        assert!(err.to_string().contains("tmp/out.mp4"));
    }
}
