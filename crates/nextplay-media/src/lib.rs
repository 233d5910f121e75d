//! Media capabilities for the NextPlay upload core.
//!
//! This crate provides:
//! - Capability traits for probing, frame extraction, trim export and capture
//! - FFmpeg/FFprobe implementations of those traits
//! - The trim planner that enforces the duration ceiling on user input
//! - The recording countdown

pub mod capability;
pub mod command;
pub mod error;
pub mod export;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod recording;
pub mod thumbnail;

pub use capability::{CaptureDevice, FrameExtractor, MediaProbe, TrimExporter};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use export::FfmpegTrimExporter;
pub use planner::{CoverRequest, TrimOutput, TrimPlanner, TrimSnapshot};
pub use probe::{probe_video, FfprobeProbe, VideoInfo};
pub use progress::{ExportProgressCallback, FfmpegProgress};
pub use recording::{record_clip, RecordingLimits, RecordingTick, RecordingTimer};
pub use thumbnail::FfmpegFrameExtractor;
