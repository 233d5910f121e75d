//! Trim export: re-encode a window into a standalone MP4.

use async_trait::async_trait;
use nextplay_models::{MediaSource, TrimRange};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::capability::TrimExporter;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::progress::ExportProgressCallback;

/// Build the re-encode command for `range`.
pub fn export_command(source: &Path, output: &Path, range: TrimRange) -> FfmpegCommand {
    FfmpegCommand::new(source, output)
        .seek(range.start())
        .duration(range.duration())
        .video_codec("libx264")
        .preset("veryfast")
        .crf(23)
        .audio_codec("aac")
        .output_args(["-movflags", "+faststart"])
}

/// [`TrimExporter`] that shells out to `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegTrimExporter {
    output_dir: PathBuf,
}

impl FfmpegTrimExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl Default for FfmpegTrimExporter {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

#[async_trait]
impl TrimExporter for FfmpegTrimExporter {
    async fn export_trim(
        &self,
        source: &MediaSource,
        range: TrimRange,
        cancel: watch::Receiver<bool>,
        on_progress: Option<ExportProgressCallback>,
    ) -> MediaResult<MediaSource> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_dir.join(unique_name(source.path()));
        let cmd = export_command(source.path(), &output, range);
        let total = range.duration();

        info!(source = %source.path().display(), %range, "Exporting trim window");
        let result = FfmpegRunner::new()
            .with_cancel(cancel)
            .run_with_progress(&cmd, move |p| {
                if let Some(cb) = &on_progress {
                    cb(p.fraction(total));
                }
            })
            .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(e);
        }

        let size = tokio::fs::metadata(&output).await?.len();
        Ok(MediaSource::new(&output, total, "mp4")?.with_size(size))
    }
}

/// `<stem>-trim-<uuid>.mp4`
fn unique_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("clip");
    format!("{}-trim-{}.mp4", stem, Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nextplay_models::{ActiveEdge, DurationPolicy};

    #[test]
    fn test_export_command() {
        let range = DurationPolicy::clamp_window(5.0, 40.0, 45.0, ActiveEdge::End);
        let args = export_command(Path::new("in.mov"), Path::new("out.mp4"), range).build_args();
        assert!(args.contains(&"10.000".to_string()));
        assert!(args.contains(&"30.000".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }

    #[test]
    fn test_unique_name() {
        let name = unique_name(Path::new("/tmp/take1.mov"));
        assert!(name.starts_with("take1-trim-"));
        assert!(name.ends_with(".mp4"));
    }
}
