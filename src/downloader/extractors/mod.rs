// InfoExtractor module - URL → stream metadata
//
// The orchestration layer only sees the InfoExtractor trait; CliInfoExtractor
// is the yt-dlp backed implementation used by the binary.

mod cli;
mod diagnostics;
mod traits;

pub use cli::CliInfoExtractor;
pub use diagnostics::{diagnose_error, FailureReason};
pub use traits::{ExtractorConfig, InfoExtractor};
