// DownloadTask - one download job on its own tokio task
//
// State crosses into the caller through a watch channel. Only the background
// unit publishes progress; kill() aborts the unit first and only then marks
// the task killed, so completion and kill never both hold.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::models::{DownloadOutcome, DownloadRequest};
use super::orchestrator::Downloader;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Pending,
    Running,
    Completed(DownloadOutcome),
    Failed(String),
    Killed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Killed)
    }
}

/// Latest published state of a task
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub percent: f64,
    pub state: TaskState,
}

pub struct DownloadTask {
    id: Uuid,
    title: String,
    downloader: Downloader,
    request: Option<DownloadRequest>,
    state_tx: Arc<watch::Sender<TaskSnapshot>>,
    state_rx: watch::Receiver<TaskSnapshot>,
    handle: Option<JoinHandle<()>>,
}

impl DownloadTask {
    /// Builds a task; nothing runs until [`start`](Self::start).
    pub fn new(downloader: Downloader, request: DownloadRequest, title: impl Into<String>) -> Self {
        let (tx, rx) = watch::channel(TaskSnapshot {
            percent: 0.0,
            state: TaskState::Pending,
        });
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            downloader,
            request: Some(request),
            state_tx: Arc::new(tx),
            state_rx: rx,
            handle: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Spawns the download and returns immediately. Calling it again, or
    /// after a kill, does nothing.
    pub fn start(&mut self) {
        if self.handle.is_some() || self.state_rx.borrow().state.is_terminal() {
            return;
        }
        let Some(request) = self.request.take() else {
            return;
        };

        let downloader = self.downloader.clone();
        let tx = Arc::clone(&self.state_tx);
        let job_id = self.id.to_string();
        let title = self.title.clone();

        tx.send_modify(|s| s.state = TaskState::Running);
        log::info!("[Task {}] Started: {}", job_id, title);

        self.handle = Some(tokio::spawn(async move {
            let mut publish = |percent: f64| {
                tx.send_if_modified(|s| {
                    let percent = percent.clamp(0.0, 100.0);
                    if percent > s.percent {
                        s.percent = percent;
                        true
                    } else {
                        false
                    }
                });
            };

            let result = downloader.run(&request, &job_id, &mut publish).await;

            match result {
                Ok(outcome) => {
                    log::info!(
                        "[Task {}] Completed: {} ({}/{} items)",
                        job_id,
                        title,
                        outcome.items_completed,
                        outcome.items_total
                    );
                    tx.send_modify(|s| {
                        s.percent = 100.0;
                        s.state = TaskState::Completed(outcome);
                    });
                }
                Err(e) => {
                    log::error!("[Task {}] Failed: {}: {}", job_id, title, e);
                    tx.send_modify(|s| s.state = TaskState::Failed(e.to_string()));
                }
            }
        }));
    }

    /// Most recent percentage, 100 once complete
    pub fn get_progress(&self) -> f64 {
        let snapshot = self.state_rx.borrow();
        match snapshot.state {
            TaskState::Completed(_) => 100.0,
            _ => snapshot.percent,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state_rx.borrow().state, TaskState::Completed(_))
    }

    pub fn is_killed(&self) -> bool {
        matches!(self.state_rx.borrow().state, TaskState::Killed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state_rx.borrow().state, TaskState::Failed(_))
    }

    pub fn error(&self) -> Option<String> {
        match &self.state_rx.borrow().state {
            TaskState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<DownloadOutcome> {
        match &self.state_rx.borrow().state {
            TaskState::Completed(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state_rx.borrow().state.clone()
    }

    /// A receiver that observes every state change of this task
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.state_rx.clone()
    }

    /// Forcibly stops the background unit. A completed or failed task keeps
    /// its state; anything else becomes killed. Partial files stay on disk.
    pub async fn kill(&mut self) {
        self.request = None;
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // Cancelled or finished, either way the unit is gone
            let _ = handle.await;
        }

        let killed = self.state_tx.send_if_modified(|s| {
            if s.state.is_terminal() {
                false
            } else {
                s.state = TaskState::Killed;
                true
            }
        });
        if killed {
            log::info!("[Task {}] Killed: {}", self.id, self.title);
        }
    }

    /// Waits for a terminal state. Returns the current state right away if
    /// the task was never started.
    pub async fn wait(&self) -> TaskState {
        if self.handle.is_none() {
            return self.state();
        }
        let mut rx = self.state_rx.clone();
        let result = rx.wait_for(|s| s.state.is_terminal()).await;
        match result {
            Ok(snapshot) => snapshot.state.clone(),
            Err(_) => self.state(),
        }
    }
}

impl Drop for DownloadTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::{DownloadError, Result};
    use crate::downloader::extractors::InfoExtractor;
    use crate::downloader::fetch::StreamFetcher;
    use crate::downloader::models::{
        Container, ContentReference, DownloadTarget, FetchHandle, MediaKind, PlaylistReference,
        Resolution, ResolutionRequest, StreamDescriptor,
    };
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct NoExtractor;

    #[async_trait]
    impl InfoExtractor for NoExtractor {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn resolve(&self, url: &str) -> Result<ContentReference> {
            Err(DownloadError::InvalidUrl(url.to_string()))
        }

        async fn resolve_playlist(&self, url: &str) -> Result<PlaylistReference> {
            Err(DownloadError::InvalidUrl(url.to_string()))
        }
    }

    /// Reports half the stream, then parks until released
    struct GatedFetcher {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl StreamFetcher for GatedFetcher {
        async fn fetch(
            &self,
            stream: &StreamDescriptor,
            path: &Path,
            on_progress: &mut (dyn FnMut(u64) + Send),
        ) -> Result<u64> {
            on_progress(stream.size / 2);
            self.gate.notified().await;
            tokio::fs::write(path, b"data").await?;
            on_progress(0);
            Ok(stream.size)
        }
    }

    fn combined_content(streams: bool) -> ContentReference {
        let streams = if streams {
            vec![StreamDescriptor {
                id: "18".to_string(),
                resolution: Some(Resolution::new(360)),
                kind: MediaKind::Combined,
                container: Container::Mp4,
                extension: "mp4".to_string(),
                size: 100,
                audio_bitrate: None,
                handle: FetchHandle {
                    url: "https://cdn.example/18".to_string(),
                    headers: Vec::new(),
                },
            }]
        } else {
            Vec::new()
        };
        ContentReference {
            id: "abc".to_string(),
            url: "https://video.example/watch?v=abc".to_string(),
            title: "Clip".to_string(),
            streams,
        }
    }

    fn make_task(dir: &Path, gate: Arc<Notify>, with_streams: bool) -> DownloadTask {
        let downloader = Downloader::new(
            Arc::new(NoExtractor),
            Arc::new(GatedFetcher { gate }),
            None,
            Container::Mp4,
            dir.join("tmp"),
        );
        let request = DownloadRequest {
            target: DownloadTarget::Content(combined_content(with_streams)),
            resolution: ResolutionRequest::Highest,
            destination: dir.join("out"),
        };
        DownloadTask::new(downloader, request, "Clip")
    }

    async fn wait_for_progress(task: &DownloadTask, percent: f64) {
        let mut rx = task.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.percent >= percent))
            .await
            .expect("progress timed out")
            .unwrap();
    }

    #[tokio::test]
    async fn test_progress_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let task = make_task(dir.path(), Arc::new(Notify::new()), true);
        assert_eq!(task.get_progress(), 0.0);
        assert_eq!(task.state(), TaskState::Pending);
        assert!(!task.is_complete());
    }

    #[tokio::test]
    async fn test_task_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let mut task = make_task(dir.path(), gate.clone(), true);

        task.start();
        wait_for_progress(&task, 50.0).await;
        assert_eq!(task.get_progress(), 50.0);
        assert!(!task.is_complete());

        gate.notify_one();
        let state = task.wait().await;

        assert!(matches!(state, TaskState::Completed(_)));
        assert!(task.is_complete());
        assert_eq!(task.get_progress(), 100.0);
        assert_eq!(
            task.outcome().unwrap().files,
            vec![dir.path().join("out").join("Clip.mp4")]
        );

        // Killing a finished task leaves it complete
        task.kill().await;
        assert!(task.is_complete());
        assert!(!task.is_killed());
    }

    #[tokio::test]
    async fn test_kill_running_task() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = make_task(dir.path(), Arc::new(Notify::new()), true);

        task.start();
        wait_for_progress(&task, 50.0).await;
        task.kill().await;

        assert!(task.is_killed());
        assert!(!task.is_complete());
        assert_eq!(task.get_progress(), 50.0);
        assert_eq!(task.wait().await, TaskState::Killed);
    }

    #[tokio::test]
    async fn test_kill_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = make_task(dir.path(), Arc::new(Notify::new()), true);

        task.kill().await;
        task.start();

        assert!(task.is_killed());
        assert_eq!(task.get_progress(), 0.0);
    }

    #[tokio::test]
    async fn test_selection_failure_fails_task() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = make_task(dir.path(), Arc::new(Notify::new()), false);

        task.start();
        let state = task.wait().await;

        assert!(matches!(state, TaskState::Failed(_)));
        assert!(task.is_failed());
        assert!(task.error().unwrap().contains("No downloadable stream"));
        assert!(!task.is_complete());
    }
}
