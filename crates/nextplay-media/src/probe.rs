//! FFprobe-backed media probing.

use async_trait::async_trait;
use nextplay_models::{mime_for_container, MediaSource};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::capability::MediaProbe;
use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Raw facts read from a video file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration: f64,
    /// FFprobe `format_name`, e.g. `mov,mp4,m4a,3gp,3g2,mj2`
    pub format_name: String,
    pub codec: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    #[serde(default)]
    format_name: String,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::invalid_video("Missing duration"))?;

    Ok(VideoInfo {
        duration,
        format_name: probe.format.format_name,
        codec: video_stream.codec_name.clone(),
        size: probe.format.size.as_deref().and_then(|s| s.parse().ok()),
    })
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProbe;

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<MediaSource> {
        let info = probe_video(path).await?;
        debug!(path = %path.display(), duration = info.duration, format = %info.format_name, "Probed media");
        Ok(source_from_info(path, info)?)
    }
}

/// The file extension is a better mime hint than `format_name`, which
/// lumps mov and mp4 together.
fn source_from_info(path: &Path, info: VideoInfo) -> Result<MediaSource, nextplay_models::ValidationError> {
    let container = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|ext| mime_for_container(ext) != "application/octet-stream")
        .map(str::to_string)
        .unwrap_or_else(|| info.format_name.clone());

    let mut source = MediaSource::new(path, info.duration, container)?;
    if let Some(codec) = info.codec {
        source = source.with_codec(codec);
    }
    if let Some(size) = info.size {
        source = source.with_size(size);
    }
    Ok(source)
}
