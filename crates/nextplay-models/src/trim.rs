//! Maximum-duration policy and trim windows.
//!
//! Every capture and import path funnels through [`DurationPolicy`], so the
//! 30 second ceiling is enforced in exactly one place.

use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;

use crate::validation::ValidationError;

/// Hard ceiling on the length of a published clip, in seconds.
pub const MAX_DURATION_SECONDS: f64 = 30.0;

/// Smallest window the planner will produce, keeping `end > start` strict.
pub const MIN_WINDOW_SECONDS: f64 = 0.1;

/// Which trim handle the user is currently dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActiveEdge {
    Start,
    End,
}

/// A validated `[start, end]` window of a source clip.
///
/// Only [`DurationPolicy`] can build one, so every instance satisfies
/// `0 <= start < end <= total` and `end - start <= MAX_DURATION_SECONDS`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct TrimRange {
    start: f64,
    end: f64,
}

impl TrimRange {
    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Length of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    /// Pull `time` into the window, snapping to the nearest bound.
    pub fn clamp_time(&self, time: f64) -> f64 {
        if time.is_nan() {
            return self.start;
        }
        time.clamp(self.start, self.end)
    }

    /// Whether the window is the entire source.
    pub fn covers(&self, total_duration: f64) -> bool {
        self.start <= 0.0 && self.end >= total_duration
    }
}

impl fmt::Display for TrimRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.2}s, {:.2}s]", self.start, self.end)
    }
}

/// Non-fatal notice that a source is longer than the ceiling.
///
/// Distinct from a hard error: the user can still publish once the window
/// has been adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct DurationWarning {
    pub total_duration: f64,
    pub max_duration: f64,
}

impl fmt::Display for DurationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Video is {:.1}s. Please trim to {:.0} seconds or less.",
            self.total_duration, self.max_duration
        )
    }
}

/// Validation and derivation rules for the maximum clip length.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationPolicy;

impl DurationPolicy {
    pub const MAX_DURATION: f64 = MAX_DURATION_SECONDS;

    /// Whether a duration is over the ceiling.
    pub fn exceeds(duration: f64) -> bool {
        duration > Self::MAX_DURATION
    }

    /// Window shown when a source is first loaded.
    ///
    /// Long sources are forced to `[0, MAX]` and produce a warning; short
    /// ones select the whole clip.
    pub fn initial_window(total_duration: f64) -> (TrimRange, Option<DurationWarning>) {
        if Self::exceeds(total_duration) {
            let warning = DurationWarning {
                total_duration,
                max_duration: Self::MAX_DURATION,
            };
            (
                TrimRange {
                    start: 0.0,
                    end: Self::MAX_DURATION,
                },
                Some(warning),
            )
        } else {
            (
                TrimRange {
                    start: 0.0,
                    end: total_duration.max(0.0),
                },
                None,
            )
        }
    }

    /// Derive a valid window from a candidate pair of handle positions.
    ///
    /// The edge being dragged wins. When the candidate is wider than the
    /// ceiling, dragging the start pulls the end in to `start + MAX`, and
    /// dragging the end pushes the start out to `end - MAX`.
    pub fn clamp_window(
        candidate_start: f64,
        candidate_end: f64,
        total_duration: f64,
        edge: ActiveEdge,
    ) -> TrimRange {
        let total = if total_duration.is_finite() {
            total_duration.max(0.0)
        } else {
            Self::MAX_DURATION
        };
        let gap = MIN_WINDOW_SECONDS.min(total);

        let start = if candidate_start.is_finite() {
            candidate_start
        } else {
            0.0
        };
        let end = if candidate_end.is_finite() {
            candidate_end
        } else {
            total
        };

        let mut start = start.clamp(0.0, total - gap);
        let mut end = end.clamp(gap, total);

        match edge {
            ActiveEdge::End => {
                if end - start > Self::MAX_DURATION {
                    start = (end - Self::MAX_DURATION).max(start);
                    while end - start > Self::MAX_DURATION {
                        start = next_up(start);
                    }
                }
                if end - start < gap {
                    start = (end - gap).max(0.0);
                }
            }
            ActiveEdge::Start => {
                if end - start > Self::MAX_DURATION {
                    end = (start + Self::MAX_DURATION).min(end);
                    while end - start > Self::MAX_DURATION {
                        end = next_down(end);
                    }
                }
                if end - start < gap {
                    end = (start + gap).min(total);
                }
            }
        }

        TrimRange { start, end }
    }

    /// Validate an exact window without adjusting it.
    pub fn check_window(start: f64, end: f64, total_duration: f64) -> Result<TrimRange, ValidationError> {
        if !(total_duration.is_finite() && total_duration > 0.0) {
            return Err(ValidationError::InvalidDuration(total_duration));
        }
        if !start.is_finite() || start < 0.0 {
            return Err(ValidationError::NegativeStart);
        }
        if !end.is_finite() || end <= start {
            return Err(ValidationError::EndNotAfterStart);
        }
        if end > total_duration {
            return Err(ValidationError::ExceedsSource {
                end,
                total: total_duration,
            });
        }
        if Self::exceeds(end - start) {
            return Err(ValidationError::WindowTooLong {
                duration: end - start,
                max: Self::MAX_DURATION,
            });
        }
        Ok(TrimRange { start, end })
    }
}

// Rounding in `end - MAX` can leave the window one ulp too wide.
fn next_up(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::MIN_POSITIVE;
    }
    f64::from_bits(x.to_bits() + 1)
}

fn next_down(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    f64::from_bits(x.to_bits() - 1)
}
