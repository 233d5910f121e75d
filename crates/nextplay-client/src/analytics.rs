//! First-party analytics events.

use chrono::{DateTime, Utc};
use nextplay_models::{Category, SessionId, VideoId};
use serde::Serialize;
use serde_json::{Map, Value};

/// One event posted to `/analytics/track`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl AnalyticsEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            user_id: "anonymous".to_string(),
            properties: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn upload_started(category: Category, has_tags: bool) -> Self {
        Self::new("upload_started")
            .with("category", category.as_str())
            .with("hasTags", has_tags)
    }

    pub fn upload_completed(session_id: &SessionId) -> Self {
        Self::new("upload_completed").with("sessionId", session_id.as_str())
    }

    pub fn upload_failed(error: &str) -> Self {
        Self::new("upload_failed").with("error", error)
    }

    pub fn publish_tapped(video_id: &VideoId) -> Self {
        Self::new("publish_tapped").with("videoId", video_id.as_str())
    }

    pub fn publish_completed(video_id: &VideoId) -> Self {
        Self::new("publish_completed").with("videoId", video_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_shape_is_flat() {
        let mut event = AnalyticsEvent::upload_started(Category::Dance, true);
        event.user_id = "u-42".to_string();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "upload_started");
        assert_eq!(json["userId"], "u-42");
        assert_eq!(json["category"], "dance");
        assert_eq!(json["hasTags"], true);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_named_events() {
        let vid = VideoId::from("v1");
        assert_eq!(AnalyticsEvent::publish_tapped(&vid).properties["videoId"], "v1");
        assert_eq!(AnalyticsEvent::upload_failed("boom").properties["error"], "boom");
        let sid = SessionId::from("s1");
        assert_eq!(AnalyticsEvent::upload_completed(&sid).event, "upload_completed");
    }
}
