// Failure diagnostics - turns extractor stderr into a user-facing reason
//
// Only used for "unexpected" resolution failures; invalid URLs never reach here.

use serde::{Deserialize, Serialize};

/// Why a resolution attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,
    AgeRestricted,
    GeoBlocked,
    /// Network timeout (soft IP block)
    NetworkTimeout,
    /// Rate limiting (429 or similar)
    RateLimited,
    PrivateVideo,
    /// Video deleted or unavailable
    VideoUnavailable,
    /// DRM-protected content
    DrmProtected,
    Unknown,
}

impl FailureReason {
    /// Check if retrying later can plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http403Forbidden | Self::NetworkTimeout | Self::RateLimited | Self::Unknown
        )
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Not available in your country",
            Self::NetworkTimeout => "Network timeout",
            Self::RateLimited => "Rate limited",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::Unknown => "Unexpected error",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        if self.is_retryable() {
            "Please try again later."
        } else {
            "This content cannot be downloaded."
        }
    }
}

/// Analyze error message and return failure reason
pub fn diagnose_error(error: &str) -> FailureReason {
    let lower = error.to_lowercase();

    if lower.contains("drm") || lower.contains("widevine") || lower.contains("requires purchase") {
        return FailureReason::DrmProtected;
    }

    if lower.contains("age-restricted") || lower.contains("confirm your age") {
        return FailureReason::AgeRestricted;
    }

    if lower.contains("private video") || lower.contains("video is private") {
        return FailureReason::PrivateVideo;
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
    {
        return FailureReason::VideoUnavailable;
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
    {
        return FailureReason::GeoBlocked;
    }

    if lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("rate limit")
    {
        return FailureReason::RateLimited;
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return FailureReason::Http403Forbidden;
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("network unreachable")
    {
        return FailureReason::NetworkTimeout;
    }

    FailureReason::Unknown
}
