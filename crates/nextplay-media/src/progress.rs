//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of `total_seconds` encoded so far, in `[0, 1]`.
    pub fn fraction(&self, total_seconds: f64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if total_seconds <= 0.0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / 1000.0 / total_seconds).clamp(0.0, 1.0)
    }
}

/// Callback type for export progress, reported as a fraction in `[0, 1]`.
pub type ExportProgressCallback = Box<dyn Fn(f64) + Send + Sync + 'static>;

/// Parse one line of `-progress` output, returning a snapshot at each block end.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => {
            // Both keys carry microseconds in practice.
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }
    None
}
