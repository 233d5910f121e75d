//! Cover frame extraction.

use async_trait::async_trait;
use nextplay_models::{CoverImage, MediaSource};
use std::path::Path;
use tracing::debug;

use crate::capability::FrameExtractor;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Width covers are scaled to; height follows the aspect ratio.
pub const COVER_SCALE_WIDTH: u32 = 720;

/// JPEG quality passed to `-q:v`.
pub const COVER_JPEG_QUALITY: u8 = 2;

/// Build the command that writes one JPEG frame at `time`.
pub fn cover_command(video_path: &Path, output_path: &Path, time: f64) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .seek(time.max(0.0))
        .single_frame()
        .video_filter(format!("scale={}:-2", COVER_SCALE_WIDTH))
        .jpeg_quality(COVER_JPEG_QUALITY)
}

/// [`FrameExtractor`] that shells out to `ffmpeg`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameExtractor {
    timeout_secs: Option<u64>,
}

impl FfmpegFrameExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(&self, source: &MediaSource, time: f64) -> MediaResult<CoverImage> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("cover.jpg");
        let cmd = cover_command(source.path(), &output, time);

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        runner.run(&cmd).await?;

        let data = tokio::fs::read(&output).await?;
        if data.is_empty() {
            return Err(MediaError::invalid_video(format!("No frame decoded at {:.2}s", time)));
        }
        debug!(time, bytes = data.len(), "Extracted cover frame");
        Ok(CoverImage::jpeg(data, time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_command() {
        let args = cover_command(Path::new("in.mp4"), Path::new("out.jpg"), 12.5).build_args();
        assert!(args.contains(&"12.500".to_string()));
        assert!(args.contains(&"scale=720:-2".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.jpg"));
    }

    #[test]
    fn test_cover_command_clamps_negative_time() {
        let args = cover_command(Path::new("in.mp4"), Path::new("out.jpg"), -1.0).build_args();
        assert!(args.contains(&"0.000".to_string()));
    }
}
