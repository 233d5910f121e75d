//! Upload flow error types.

use nextplay_client::ApiError;
use nextplay_media::MediaError;
use nextplay_models::ValidationError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type UploadResult<T> = Result<T, UploadError>;

/// Step that terminated an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Source,
    Export,
    Init,
    MediaUpload,
    Thumbnail,
    Completion,
    StatusCheck,
    ProcessingFailed,
    ProcessingTimeout,
    Publish,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Source => "source",
            FailureReason::Export => "export",
            FailureReason::Init => "init",
            FailureReason::MediaUpload => "media_upload",
            FailureReason::Thumbnail => "thumbnail",
            FailureReason::Completion => "completion",
            FailureReason::StatusCheck => "status_check",
            FailureReason::ProcessingFailed => "processing_failed",
            FailureReason::ProcessingTimeout => "processing_timeout",
            FailureReason::Publish => "publish",
        }
    }

    /// The asset may still appear later; nothing was lost.
    pub fn is_non_destructive(&self) -> bool {
        matches!(self, FailureReason::ProcessingTimeout)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors surfaced by the upload flow.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not load video: {0}")]
    Source(MediaError),

    #[error("trim export failed: {0}")]
    Export(MediaError),

    #[error("upload session failed: {}", .0.server_message())]
    Init(ApiError),

    #[error("media upload failed: {}", .0.server_message())]
    MediaUpload(ApiError),

    #[error("thumbnail upload failed: {}", .0.server_message())]
    Thumbnail(ApiError),

    #[error("upload completion failed: {}", .0.server_message())]
    Completion(ApiError),

    #[error("status check failed: {}", .0.server_message())]
    StatusCheck(ApiError),

    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    #[error("still processing after {attempts} checks")]
    ProcessingTimeout { attempts: u32 },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("upload cancelled")]
    Cancelled,

    #[error("an upload is already in progress")]
    AlreadyInProgress,

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl UploadError {
    pub fn invalid_transition(from: impl fmt::Debug, to: impl fmt::Debug) -> Self {
        Self::InvalidTransition {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }

    /// Step that failed, for errors that end an attempt in `Failed`.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            UploadError::Source(_) => Some(FailureReason::Source),
            UploadError::Export(_) => Some(FailureReason::Export),
            UploadError::Init(_) => Some(FailureReason::Init),
            UploadError::MediaUpload(_) => Some(FailureReason::MediaUpload),
            UploadError::Thumbnail(_) => Some(FailureReason::Thumbnail),
            UploadError::Completion(_) => Some(FailureReason::Completion),
            UploadError::StatusCheck(_) => Some(FailureReason::StatusCheck),
            UploadError::ProcessingFailed(_) => Some(FailureReason::ProcessingFailed),
            UploadError::ProcessingTimeout { .. } => Some(FailureReason::ProcessingTimeout),
            UploadError::Publish(_) => Some(FailureReason::Publish),
            UploadError::Validation(_)
            | UploadError::Cancelled
            | UploadError::AlreadyInProgress
            | UploadError::InvalidTransition { .. } => None,
        }
    }

    /// Message suitable for a failure banner.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::ProcessingTimeout { .. } => {
                "Your video is still processing and will appear in the feed when it's ready."
                    .to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
            || matches!(self, UploadError::Export(MediaError::Cancelled))
    }

    pub fn is_non_destructive(&self) -> bool {
        self.failure_reason()
            .is_some_and(|r| r.is_non_destructive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_messages() {
        let err = UploadError::MediaUpload(ApiError::from_http_status(500, "Media upload failed"));
        assert!(err.to_string().starts_with("media upload failed"));
        assert_eq!(err.failure_reason(), Some(FailureReason::MediaUpload));

        let err = UploadError::Init(ApiError::from_http_status(400, "Title is required"));
        assert_eq!(err.to_string(), "upload session failed: Title is required");
    }

    #[test]
    fn test_timeout_is_distinct_from_failure() {
        let timeout = UploadError::ProcessingTimeout { attempts: 60 };
        let failed = UploadError::ProcessingFailed("codec not supported".into());
        assert!(timeout.is_non_destructive());
        assert!(!failed.is_non_destructive());
        assert_ne!(timeout.failure_reason(), failed.failure_reason());
        assert!(timeout.user_message().contains("still processing"));
    }

    #[test]
    fn test_local_errors_have_no_failure_reason() {
        assert!(UploadError::from(ValidationError::MissingTitle)
            .failure_reason()
            .is_none());
        assert!(UploadError::Cancelled.failure_reason().is_none());
        assert!(UploadError::Cancelled.is_cancelled());
        assert!(UploadError::Export(MediaError::Cancelled).is_cancelled());
    }
}
