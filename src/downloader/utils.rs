// Helper functions shared by the extractor, fetcher and orchestrator

use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};

use super::errors::{DownloadError, Result};

/// Run command with timeout, capturing stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::ToolNotFound(format!("Failed to start {}: {}", program, e)))?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res?;
            let stdout = stdout_task
                .await
                .map_err(|e| DownloadError::ExecutionError(format!("stdout task failed: {}", e)))??;
            let stderr = stderr_task
                .await
                .map_err(|e| DownloadError::ExecutionError(format!("stderr task failed: {}", e)))??;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::Unavailable(format!(
                "{} timed out after {}s",
                program, timeout_secs
            )))
        }
    }
}

/// Sanitizes a filename by removing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Creates a directory (and parents) if it doesn't exist. Idempotent.
pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.is_dir() {
        tokio::fs::create_dir_all(path).await?;
        log::info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Move a file, falling back to copy + remove when rename crosses filesystems
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

/// A URL names a playlist when it carries a `list=` parameter and is not a
/// generated mix ("radio").
pub fn is_playlist_url(url: &str) -> bool {
    lazy_static::lazy_static! {
        static ref LIST_RE: Regex = Regex::new(r"[?&]list=[^&#]+").unwrap();
    }
    LIST_RE.is_match(url) && !url.to_lowercase().contains("radio")
}
