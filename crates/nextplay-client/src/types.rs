//! Wire types for the upload API.

use nextplay_models::{Category, FeedItem, ProcessingState, UploadMetadata, Visibility};
use serde::{Deserialize, Serialize};

/// Body of `POST /videos/upload-session`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub title: &'a str,
    pub category: Category,
    pub tags: &'a [String],
    pub visibility: Visibility,
    pub duration: f64,
}

impl<'a> From<&'a UploadMetadata> for CreateSessionRequest<'a> {
    fn from(meta: &'a UploadMetadata) -> Self {
        Self {
            title: meta.title(),
            category: meta.category(),
            tags: meta.tags(),
            visibility: meta.visibility(),
            duration: meta.duration_seconds(),
        }
    }
}

/// Response of `GET /videos/{videoId}/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusResponse {
    pub state: ProcessingState,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `POST /videos/{videoId}/publish`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub success: bool,
    #[serde(default)]
    pub feed_item: Option<FeedItem>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body the API returns on non-2xx.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Pull the most specific message out of a raw error body.
    pub(crate) fn message_from(body: &str, fallback: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}
