//! Global upload progress.
//!
//! One value on a 0-100 scale, split into fixed bands per step:
//! media `[0, 80]`, thumbnail `(80, 90]`, completion `(90, 100]`.

use serde::Serialize;

pub const MEDIA_BAND_END: f64 = 80.0;
pub const THUMBNAIL_STARTED: f64 = 85.0;
pub const THUMBNAIL_DONE: f64 = 90.0;
pub const COMPLETING: f64 = 95.0;
pub const DONE: f64 = 100.0;

/// Monotonic progress for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct UploadProgress {
    value: f64,
}

impl UploadProgress {
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Raise progress to `target`. Never moves backwards.
    ///
    /// Returns true if the value changed.
    pub fn advance_to(&mut self, target: f64) -> bool {
        if target.is_nan() {
            return false;
        }
        let target = target.clamp(0.0, DONE);
        if target > self.value {
            self.value = target;
            true
        } else {
            false
        }
    }

    /// Map uploaded bytes into the media band.
    pub fn advance_media(&mut self, sent: u64, total: u64) -> bool {
        let fraction = if total == 0 {
            1.0
        } else {
            (sent as f64 / total as f64).min(1.0)
        };
        self.advance_to(fraction * MEDIA_BAND_END)
    }

    /// Only an explicit retry resets progress.
    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let mut p = UploadProgress::default();
        assert!(p.advance_to(40.0));
        assert!(!p.advance_to(20.0));
        assert_eq!(p.value(), 40.0);
        assert!(!p.advance_to(f64::NAN));
        assert!(p.advance_to(250.0));
        assert_eq!(p.value(), 100.0);
    }

    #[test]
    fn test_media_band() {
        let mut p = UploadProgress::default();
        p.advance_media(512, 1024);
        assert_eq!(p.value(), 40.0);
        p.advance_media(4096, 1024);
        assert_eq!(p.value(), MEDIA_BAND_END);

        let mut empty = UploadProgress::default();
        empty.advance_media(0, 0);
        assert_eq!(empty.value(), MEDIA_BAND_END);
    }

    #[test]
    fn test_reset() {
        let mut p = UploadProgress::default();
        p.advance_to(COMPLETING);
        p.reset();
        assert_eq!(p.value(), 0.0);
    }
}
