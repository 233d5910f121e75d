//! Media sources and cover frames.

use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::trim::TrimRange;
use crate::validation::ValidationError;

/// A probed local video file.
///
/// Owned by the capture/import collaborator; the upload core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSource {
    path: PathBuf,
    total_duration_seconds: f64,
    mime_type: String,
    container: String,
    codec: Option<String>,
    size_bytes: Option<u64>,
}

impl MediaSource {
    /// Create a media source from probe results.
    pub fn new(
        path: impl Into<PathBuf>,
        total_duration_seconds: f64,
        container: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if !(total_duration_seconds.is_finite() && total_duration_seconds > 0.0) {
            return Err(ValidationError::InvalidDuration(total_duration_seconds));
        }
        let container = container.into().to_lowercase();
        Ok(Self {
            path: path.into(),
            total_duration_seconds,
            mime_type: mime_for_container(&container).to_string(),
            container,
            codec: None,
            size_bytes: None,
        })
    }

    /// Override the mime type derived from the container.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn codec(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }
}

/// Map a container name (or file extension) to the upload mime type.
pub fn mime_for_container(container: &str) -> &'static str {
    match container.to_lowercase().as_str() {
        "mp4" | "m4v" | "mov,mp4,m4a,3gp,3g2,mj2" => "video/mp4",
        "mov" | "quicktime" => "video/quicktime",
        "webm" | "matroska,webm" => "video/webm",
        "mkv" | "matroska" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// An encoded still frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverImage {
    data: Bytes,
    mime_type: &'static str,
    time: f64,
}

impl CoverImage {
    /// JPEG-encoded frame captured at `time` seconds.
    pub fn jpeg(data: impl Into<Bytes>, time: f64) -> Self {
        Self {
            data: data.into(),
            mime_type: "image/jpeg",
            time,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Source timestamp the frame was taken from.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The chosen cover timestamp and its lazily extracted image.
///
/// Only the latest extracted frame is kept; there is no history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverSelection {
    time: f64,
    image: Option<CoverImage>,
}

impl CoverSelection {
    pub fn at(time: f64) -> Self {
        Self { time, image: None }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn image(&self) -> Option<&CoverImage> {
        self.image.as_ref()
    }

    /// Move the timestamp into `range`. Returns true if it changed.
    pub fn retarget(&mut self, time: f64, range: &TrimRange) -> bool {
        let clamped = range.clamp_time(time);
        if clamped == self.time {
            return false;
        }
        self.time = clamped;
        true
    }

    /// Replace the image with a freshly extracted one.
    pub fn set_image(&mut self, image: CoverImage) {
        self.image = Some(image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trim::{ActiveEdge, DurationPolicy};

    #[test]
    fn test_media_source_rejects_bad_duration() {
        assert!(MediaSource::new("/tmp/a.mp4", 0.0, "mp4").is_err());
        assert!(MediaSource::new("/tmp/a.mp4", f64::NAN, "mp4").is_err());
        assert!(MediaSource::new("/tmp/a.mp4", -3.0, "mp4").is_err());
    }

    #[test]
    fn test_media_source_mime() {
        let source = MediaSource::new("/tmp/a.mov", 12.0, "MOV").unwrap();
        assert_eq!(source.mime_type(), "video/quicktime");
        assert_eq!(source.container(), "mov");

        let source = source.with_mime_type("video/mp4");
        assert_eq!(source.mime_type(), "video/mp4");
    }

    #[test]
    fn test_mime_for_container() {
        assert_eq!(mime_for_container("mp4"), "video/mp4");
        assert_eq!(mime_for_container("webm"), "video/webm");
        assert_eq!(mime_for_container("avi"), "application/octet-stream");
    }

    #[test]
    fn test_cover_retarget_clamps_into_window() {
        let range = DurationPolicy::clamp_window(10.0, 20.0, 45.0, ActiveEdge::End);
        let mut cover = CoverSelection::at(0.0);
        cover.set_image(CoverImage::jpeg(vec![1u8, 2, 3], 0.0));

        assert!(cover.retarget(3.0, &range));
        assert_eq!(cover.time(), 10.0);
        // The stale image stays until a new frame replaces it.
        assert!(cover.image().is_some());

        assert!(!cover.retarget(10.0, &range));
    }
}
