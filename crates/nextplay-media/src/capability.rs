//! Capability interfaces the orchestration core depends on.
//!
//! Platform toolkits (camera stacks, decoders, encoders) implement these so
//! the core never branches on platform.

use async_trait::async_trait;
use nextplay_models::{CoverImage, MediaSource, TrimRange};
use std::path::Path;
use tokio::sync::watch;

use crate::error::MediaResult;
use crate::progress::ExportProgressCallback;

/// Reads duration and container identity from a local file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<MediaSource>;
}

/// Decodes a single still frame.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract_frame(&self, source: &MediaSource, time: f64) -> MediaResult<CoverImage>;
}

/// Re-encodes a trim window into a standalone file.
#[async_trait]
pub trait TrimExporter: Send + Sync {
    /// Runs to completion or until `cancel` flips to `true`.
    async fn export_trim(
        &self,
        source: &MediaSource,
        range: TrimRange,
        cancel: watch::Receiver<bool>,
        on_progress: Option<ExportProgressCallback>,
    ) -> MediaResult<MediaSource>;
}

/// A camera or screen recorder.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn start_capture(&self) -> MediaResult<()>;

    /// Finalize the recording and hand back the written file.
    async fn stop_capture(&self) -> MediaResult<MediaSource>;

    async fn flip_camera(&self) -> MediaResult<()>;

    /// Returns whether the flash is now on.
    async fn toggle_flash(&self) -> MediaResult<bool>;
}
