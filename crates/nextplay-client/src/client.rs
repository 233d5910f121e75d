//! NextPlay upload API client.
//!
//! - Bearer token injection from a [`TokenSource`]
//! - Streamed media PUT with byte-level progress
//! - Observability (tracing spans, metrics)
//! - A single upload slot shared by all clones

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use nextplay_models::{
    CoverImage, SessionId, UploadMetadata, UploadSessionHandle, VideoDescriptor,
    VideoId,
};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{multipart, Body, Client, RequestBuilder, Response};
use tokio::sync::watch;
use tracing::{debug, info_span, warn, Instrument};
use url::Url;

use crate::analytics::AnalyticsEvent;
use crate::auth::TokenSource;
use crate::config::ApiClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{record_request, record_upload_bytes};
use crate::types::{CreateSessionRequest, ErrorBody, PublishResponse, StatusResponse};

/// Default slice size for streamed media bodies.
pub const DEFAULT_CHUNK_BYTES: usize = 256 * 1024;

/// Holds the client's single upload slot until dropped.
#[derive(Debug)]
pub struct UploadSlot {
    active: Arc<AtomicBool>,
}

impl Drop for UploadSlot {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// HTTP client for the upload API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    upload_http: Client,
    config: ApiClientConfig,
    token: Arc<dyn TokenSource>,
    active_upload: Arc<AtomicBool>,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig, token: Arc<dyn TokenSource>) -> ApiResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("nextplay-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let upload_http = Client::builder()
            .timeout(config.upload_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("nextplay-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            upload_http,
            config,
            token,
            active_upload: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Claim the upload slot, or fail if another attempt holds it.
    pub fn try_begin_upload(&self) -> ApiResult<UploadSlot> {
        self.active_upload
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ApiError::UploadInProgress)?;
        Ok(UploadSlot {
            active: Arc::clone(&self.active_upload),
        })
    }

    pub fn is_upload_active(&self) -> bool {
        self.active_upload.load(Ordering::Acquire)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // =========================================================================
    // Upload steps
    // =========================================================================

    /// `POST /videos/upload-session`
    pub async fn create_upload_session(&self, metadata: &UploadMetadata) -> ApiResult<UploadSessionHandle> {
        let url = self.config.endpoint("/videos/upload-session");
        let body = CreateSessionRequest::from(metadata);

        self.execute_request("create_upload_session", None, async {
            let response = self
                .authorized(self.http.post(&url))
                .json(&body)
                .send()
                .await?;
            let response = Self::check(response, "Failed to create upload session").await?;
            let handle: UploadSessionHandle = response.json().await?;
            Url::parse(&handle.upload_url)
                .map_err(|e| ApiError::invalid_response(format!("uploadUrl: {}", e)))?;
            Ok(handle)
        })
        .await
    }

    /// `PUT {uploadUrl}` with the raw media bytes.
    ///
    /// Cumulative bytes handed to the transport are published on `progress`.
    /// Dropping the returned future aborts the request.
    pub async fn upload_media(
        &self,
        handle: &UploadSessionHandle,
        data: Bytes,
        mime_type: &str,
        chunk_bytes: usize,
        progress: Option<watch::Sender<u64>>,
    ) -> ApiResult<()> {
        let url = Url::parse(&handle.upload_url)?;
        let total = data.len() as u64;
        let body = Body::wrap_stream(chunked_body(data, chunk_bytes.max(1), progress));

        self.execute_request("upload_media", Some(&handle.video_id), async {
            // Presigned URLs carry their own authorization.
            let response = self
                .upload_http
                .put(url)
                .header(CONTENT_TYPE, mime_type)
                .header(CONTENT_LENGTH, total)
                .body(body)
                .send()
                .await?;
            Self::check(response, "Media upload failed").await?;
            record_upload_bytes(total);
            Ok(())
        })
        .await
    }

    /// `POST /videos/{videoId}/thumbnail` as multipart.
    pub async fn upload_thumbnail(&self, video_id: &VideoId, cover: &CoverImage) -> ApiResult<()> {
        let url = self.config.endpoint(&format!("/videos/{}/thumbnail", video_id));
        let part = multipart::Part::bytes(cover.data().to_vec())
            .file_name("thumbnail.jpg")
            .mime_str(cover.mime_type())?;
        let form = multipart::Form::new().part("thumbnail", part);

        self.execute_request("upload_thumbnail", Some(video_id), async {
            let response = self
                .authorized(self.http.post(&url))
                .multipart(form)
                .send()
                .await?;
            Self::check(response, "Failed to upload thumbnail").await?;
            Ok(())
        })
        .await
    }

    /// `POST /videos/upload-session/{sessionId}/complete`
    pub async fn complete_upload(&self, session_id: &SessionId, video_id: &VideoId) -> ApiResult<VideoDescriptor> {
        let url = self
            .config
            .endpoint(&format!("/videos/upload-session/{}/complete", session_id));

        self.execute_request("complete_upload", Some(video_id), async {
            let response = self.authorized(self.http.post(&url)).send().await?;
            let response = Self::check(response, "Failed to complete upload").await?;
            let text = response.text().await?;
            // Some deployments answer with an empty body.
            if text.trim().is_empty() {
                return Ok(VideoDescriptor {
                    video_id: video_id.clone(),
                    status: None,
                    video_url: None,
                    thumbnail_url: None,
                });
            }
            Ok(serde_json::from_str(&text)?)
        })
        .await
    }

    /// `POST /videos/{videoId}/publish`
    pub async fn publish_video(&self, video_id: &VideoId) -> ApiResult<PublishResponse> {
        let url = self.config.endpoint(&format!("/videos/{}/publish", video_id));

        self.execute_request("publish_video", Some(video_id), async {
            let response = self.authorized(self.http.post(&url)).send().await?;
            let response = Self::check(response, "Failed to publish video").await?;
            Ok(response.json().await?)
        })
        .await
    }

    /// `GET /videos/{videoId}/status`
    pub async fn processing_status(&self, video_id: &VideoId) -> ApiResult<StatusResponse> {
        let url = self.config.endpoint(&format!("/videos/{}/status", video_id));

        self.execute_request("processing_status", Some(video_id), async {
            let response = self.authorized(self.http.get(&url)).send().await?;
            let response = Self::check(response, "Failed to check processing status").await?;
            Ok(response.json().await?)
        })
        .await
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    /// Fire-and-forget `POST /analytics/track`. Never fails the caller.
    pub fn track(&self, mut event: AnalyticsEvent) {
        if !self.config.analytics_enabled {
            return;
        }
        if let Some(user_id) = self.token.user_id() {
            event.user_id = user_id;
        }
        debug!(event = %event.event, "Analytics event");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(event = %event.event, "No runtime, dropping analytics event");
            return;
        };
        let http = self.http.clone();
        let url = self.config.endpoint("/analytics/track");
        runtime.spawn(async move {
            match http.post(&url).json(&event).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!(event = %event.event, status = %resp.status(), "Analytics send rejected");
                }
                Err(e) => warn!(event = %event.event, error = %e, "Analytics send failed"),
                Ok(_) => {}
            }
        });
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn check(response: Response, fallback: &str) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_http_status(
            status.as_u16(),
            ErrorBody::message_from(&body, fallback),
        ))
    }

    async fn execute_request<T, F>(&self, operation: &str, video_id: Option<&VideoId>, fut: F) -> ApiResult<T>
    where
        F: std::future::Future<Output = ApiResult<T>>,
    {
        let span = if let Some(id) = video_id {
            info_span!("api_request", operation = %operation, video_id = %id)
        } else {
            info_span!("api_request", operation = %operation)
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(0),
        };
        record_request(operation, status, latency_ms);

        result
    }
}

/// Split `data` into zero-copy slices that report cumulative bytes as the
/// transport pulls them.
fn chunked_body(
    data: Bytes,
    chunk_bytes: usize,
    progress: Option<watch::Sender<u64>>,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let len = data.len();
    let chunks: Vec<Bytes> = (0..len)
        .step_by(chunk_bytes)
        .map(|offset| data.slice(offset..(offset + chunk_bytes).min(len)))
        .collect();

    let mut sent = 0u64;
    stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(tx) = &progress {
            tx.send_replace(sent);
        }
        Ok(chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    #[tokio::test]
    async fn test_chunked_body_reports_progress() {
        let (tx, rx) = watch::channel(0u64);
        let data = Bytes::from(vec![7u8; 10]);
        let chunks: Vec<_> = chunked_body(data, 4, Some(tx)).collect().await;

        let sizes: Vec<usize> = chunks.iter().map(|c| c.as_ref().unwrap().len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(*rx.borrow(), 10);
    }

    #[tokio::test]
    async fn test_chunked_body_empty() {
        let chunks: Vec<_> = chunked_body(Bytes::new(), 4, None).collect().await;
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_upload_slot_is_exclusive() {
        let client = ApiClient::new(ApiClientConfig::default(), Arc::new(StaticToken::anonymous())).unwrap();
        let other = client.clone();

        let slot = client.try_begin_upload().unwrap();
        assert!(other.is_upload_active());
        assert!(matches!(other.try_begin_upload(), Err(ApiError::UploadInProgress)));

        drop(slot);
        assert!(!client.is_upload_active());
        assert!(other.try_begin_upload().is_ok());
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let config = ApiClientConfig::default().with_base_url("::nope::");
        assert!(ApiClient::new(config, Arc::new(StaticToken::anonymous())).is_err());
    }
}
