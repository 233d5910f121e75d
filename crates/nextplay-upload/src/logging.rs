//! Structured upload logging.
//!
//! Every line for one attempt carries the same `attempt_id`, and the video
//! id once the server has issued one.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Logger for one upload attempt.
#[derive(Debug, Clone)]
pub struct UploadLogger {
    attempt_id: String,
    video_id: Option<String>,
}

impl Default for UploadLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadLogger {
    pub fn new() -> Self {
        Self {
            attempt_id: Uuid::new_v4().to_string(),
            video_id: None,
        }
    }

    pub fn set_video_id(&mut self, video_id: impl ToString) {
        self.video_id = Some(video_id.to_string());
    }

    fn video(&self) -> &str {
        self.video_id.as_deref().unwrap_or("-")
    }

    pub fn log_start(&self, message: &str) {
        info!(attempt_id = %self.attempt_id, video_id = %self.video(), "Upload started: {}", message);
    }

    pub fn log_step(&self, step: &str) {
        info!(attempt_id = %self.attempt_id, video_id = %self.video(), step, "Upload step");
    }

    pub fn log_progress(&self, percent: f64) {
        info!(attempt_id = %self.attempt_id, video_id = %self.video(), percent, "Upload progress");
    }

    pub fn log_warning(&self, message: &str) {
        warn!(attempt_id = %self.attempt_id, video_id = %self.video(), "Upload warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(attempt_id = %self.attempt_id, video_id = %self.video(), "Upload error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(attempt_id = %self.attempt_id, video_id = %self.video(), "Upload completed: {}", message);
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!("upload", attempt_id = %self.attempt_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_ids() {
        let mut logger = UploadLogger::new();
        assert_eq!(logger.attempt_id().len(), 36);
        assert!(logger.video_id().is_none());

        logger.set_video_id("vid-1");
        assert_eq!(logger.video_id(), Some("vid-1"));
        logger.log_step("uploading_media");
    }

    #[test]
    fn test_fresh_attempt_ids() {
        assert_ne!(UploadLogger::new().attempt_id(), UploadLogger::new().attempt_id());
    }
}
