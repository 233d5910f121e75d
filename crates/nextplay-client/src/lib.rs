//! HTTP client for the NextPlay upload API.
//!
//! Wraps every endpoint the capture-to-publish flow calls:
//! session creation, media PUT, thumbnail, completion, publish, status
//! polling and fire-and-forget analytics.

pub mod analytics;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use analytics::AnalyticsEvent;
pub use auth::{EnvToken, StaticToken, TokenSource};
pub use client::{ApiClient, UploadSlot, DEFAULT_CHUNK_BYTES};
pub use config::ApiClientConfig;
pub use error::{ApiError, ApiResult};
pub use types::{CreateSessionRequest, PublishResponse, StatusResponse};
