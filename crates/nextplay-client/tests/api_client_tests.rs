//! ApiClient tests against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nextplay_client::{ApiClient, ApiClientConfig, ApiError, AnalyticsEvent, StaticToken};
use nextplay_models::{Category, CoverImage, MetadataDraft, ProcessingState, UploadSessionHandle, VideoId};
use serde_json::json;
use tokio::sync::watch;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    let config = ApiClientConfig::default().with_base_url(format!("{}/api", server.uri()));
    ApiClient::new(config, Arc::new(StaticToken::new("test-token").with_user_id("user-7"))).unwrap()
}

fn handle_for(server: &MockServer) -> UploadSessionHandle {
    serde_json::from_value(json!({
        "sessionId": "sess-1",
        "videoId": "vid-1",
        "uploadUrl": format!("{}/storage/vid-1?sig=abc", server.uri()),
        "expiresAt": "2030-01-01T00:00:00Z"
    }))
    .unwrap()
}

#[tokio::test]
async fn test_create_upload_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/upload-session"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "title": "Kickflip",
            "category": "sports",
            "tags": ["skate"],
            "visibility": "public",
            "duration": 9.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "sess-1",
            "videoId": "vid-1",
            "uploadUrl": "https://storage.example/vid-1?sig=abc",
            "expiresAt": "2030-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let meta = MetadataDraft::new("Kickflip", Category::Sports)
        .with_tag("skate")
        .commit(9.5, None)
        .unwrap();
    let handle = client_for(&server).create_upload_session(&meta).await.unwrap();
    assert_eq!(handle.session_id.as_str(), "sess-1");
    assert_eq!(handle.video_id.as_str(), "vid-1");
}

#[tokio::test]
async fn test_create_upload_session_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/upload-session"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Title is required"})))
        .mount(&server)
        .await;

    let meta = MetadataDraft::new("x", Category::Art).commit(3.0, None).unwrap();
    let err = client_for(&server).create_upload_session(&meta).await.unwrap_err();
    assert!(matches!(err, ApiError::RequestFailed { status: 400, .. }));
    assert_eq!(err.server_message(), "Title is required");
}

#[tokio::test]
async fn test_create_upload_session_rejects_bad_upload_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/upload-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "sess-1",
            "videoId": "vid-1",
            "uploadUrl": "not a url",
            "expiresAt": "2030-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let meta = MetadataDraft::new("x", Category::Art).commit(3.0, None).unwrap();
    let err = client_for(&server).create_upload_session(&meta).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(ref m) if m.starts_with("uploadUrl")));
}

#[tokio::test]
async fn test_upload_media_streams_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/storage/vid-1"))
        .and(header("content-type", "video/mp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let (tx, rx) = watch::channel(0u64);
    let data = Bytes::from(vec![1u8; 10_000]);
    client
        .upload_media(&handle_for(&server), data, "video/mp4", 1024, Some(tx))
        .await
        .unwrap();
    assert_eq!(*rx.borrow(), 10_000);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body.len(), 10_000);
}

#[tokio::test]
async fn test_upload_media_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .upload_media(&handle_for(&server), Bytes::from_static(b"abc"), "video/mp4", 2, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ServerError(500, _)));
    assert_eq!(err.server_message(), "Media upload failed");
}

#[tokio::test]
async fn test_upload_thumbnail_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/vid-1/thumbnail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"thumbnailUrl": "https://cdn/x.jpg"})))
        .expect(1)
        .mount(&server)
        .await;

    let cover = CoverImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xE0], 2.0);
    client_for(&server)
        .upload_thumbnail(&VideoId::from("vid-1"), &cover)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"thumbnail\""));
    assert!(body.contains("filename=\"thumbnail.jpg\""));
    assert!(body.contains("image/jpeg"));
}

#[tokio::test]
async fn test_complete_and_publish() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/upload-session/sess-1/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videoId": "vid-1",
            "status": "processing"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/videos/vid-1/publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "feedItem": {"id": "post-1", "caption": "Kickflip", "hashtags": ["skate"]}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let vid = VideoId::from("vid-1");
    let descriptor = client.complete_upload(&"sess-1".into(), &vid).await.unwrap();
    assert_eq!(descriptor.status, Some(ProcessingState::Processing));

    let published = client.publish_video(&vid).await.unwrap();
    assert!(published.success);
    assert_eq!(published.feed_item.unwrap().id, "post-1");
}

#[tokio::test]
async fn test_complete_with_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/upload-session/sess-1/complete"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let vid = VideoId::from("vid-1");
    let descriptor = client_for(&server)
        .complete_upload(&"sess-1".into(), &vid)
        .await
        .unwrap();
    assert_eq!(descriptor.video_id, vid);
    assert!(descriptor.status.is_none());
}

#[tokio::test]
async fn test_processing_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/vid-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "failed",
            "message": "Unsupported codec"
        })))
        .mount(&server)
        .await;

    let status = client_for(&server)
        .processing_status(&VideoId::from("vid-1"))
        .await
        .unwrap();
    assert_eq!(status.state, ProcessingState::Failed);
    assert_eq!(status.message.as_deref(), Some("Unsupported codec"));
}

#[tokio::test]
async fn test_track_is_fire_and_forget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analytics/track"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.track(AnalyticsEvent::upload_started(Category::Music, false));

    let mut received = Vec::new();
    for _ in 0..50 {
        received = server.received_requests().await.unwrap();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let event: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(event["event"], "upload_started");
    assert_eq!(event["userId"], "user-7");
    assert_eq!(event["hasTags"], false);
}

#[tokio::test]
async fn test_track_disabled_sends_nothing() {
    let server = MockServer::start().await;
    let mut config = ApiClientConfig::default().with_base_url(server.uri());
    config.analytics_enabled = false;
    let client = ApiClient::new(config, Arc::new(StaticToken::anonymous())).unwrap();

    client.track(AnalyticsEvent::new("publish_tapped"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.received_requests().await.unwrap().is_empty());
}
