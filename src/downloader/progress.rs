// Byte-level progress for a fetch plan
//
// total = video + audio. While the video is fetched the whole audio stream is
// still outstanding; once audio starts only its own remainder counts.

use super::models::FetchPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Video,
    Audio,
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    video_size: u64,
    audio_size: u64,
    phase: Phase,
    last: f64,
}

impl ProgressTracker {
    /// Combined plans have no audio phase: `audio_size` is 0.
    pub fn new(video_size: u64, audio_size: u64) -> Self {
        Self {
            video_size,
            audio_size,
            phase: Phase::Video,
            last: 0.0,
        }
    }

    pub fn for_plan(plan: &FetchPlan) -> Self {
        match plan {
            FetchPlan::Combined(stream) => Self::new(stream.size, 0),
            FetchPlan::Separate { video, audio } => Self::new(video.size, audio.size),
        }
    }

    /// Switch to the audio stream of a separate plan
    pub fn start_audio(&mut self) {
        self.phase = Phase::Audio;
    }

    /// Percentage after a chunk, given the bytes remaining in the current
    /// stream. Never decreases and never exceeds 100.
    pub fn update(&mut self, bytes_remaining: u64) -> f64 {
        let total = self.video_size + self.audio_size;
        if total == 0 {
            return self.last;
        }

        let remaining = match self.phase {
            Phase::Video => self.audio_size + bytes_remaining.min(self.video_size),
            Phase::Audio => bytes_remaining.min(self.audio_size),
        };

        let percent = ((total - remaining) as f64 / total as f64) * 100.0;
        self.last = self.last.max(percent.clamp(0.0, 100.0));
        self.last
    }
}
