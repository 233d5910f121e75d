//! Upload flow configuration.

use nextplay_client::DEFAULT_CHUNK_BYTES;
use nextplay_media::RecordingLimits;
use std::time::Duration;

/// Largest media file accepted for upload.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;

/// Upload flow configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Wait between processing status polls
    pub poll_interval: Duration,
    /// Total status polls before giving up as "still processing"
    pub poll_max_attempts: u32,
    /// Pause after publish so feed indexing can catch up
    pub settle_delay: Duration,
    pub max_file_bytes: u64,
    /// Re-encode the trim window before upload instead of sending the
    /// full file with the window duration as metadata
    pub export_trim: bool,
    pub upload_chunk_bytes: usize,
    pub recording: RecordingLimits,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_max_attempts: 60, // ~5 minutes
            settle_delay: Duration::from_secs(2),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            export_trim: false,
            upload_chunk_bytes: DEFAULT_CHUNK_BYTES,
            recording: RecordingLimits::default(),
        }
    }
}

impl UploadConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("NEXTPLAY_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            poll_max_attempts: std::env::var("NEXTPLAY_POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(60),
            settle_delay: Duration::from_secs(
                std::env::var("NEXTPLAY_SETTLE_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            max_file_bytes: std::env::var("NEXTPLAY_MAX_FILE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_FILE_BYTES),
            export_trim: std::env::var("NEXTPLAY_EXPORT_TRIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            upload_chunk_bytes: std::env::var("NEXTPLAY_UPLOAD_CHUNK_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_CHUNK_BYTES),
            recording: RecordingLimits::default(),
        }
    }
}
