//! Trim planning: turns handle drags into a valid window and cover frame.

use nextplay_models::{
    ActiveEdge, CoverImage, CoverSelection, DurationPolicy, DurationWarning, MediaSource,
    TrimRange, ValidationError,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::capability::FrameExtractor;
use crate::error::MediaResult;

/// A pending still-frame extraction.
///
/// Carries a generation so results that arrive after the cover moved again
/// can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverRequest {
    generation: u64,
    time: f64,
}

impl CoverRequest {
    pub fn time(&self) -> f64 {
        self.time
    }
}

/// Observable view of the planner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimSnapshot {
    pub total_duration: f64,
    pub range: TrimRange,
    pub warning: Option<DurationWarning>,
    pub cover_time: f64,
    pub has_cover_image: bool,
    pub can_continue: bool,
}

/// What the planner hands to metadata entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimOutput {
    pub range: TrimRange,
    pub cover: Option<CoverImage>,
}

/// Owns the trim window and cover selection for one loaded source.
#[derive(Debug, Clone)]
pub struct TrimPlanner {
    source: MediaSource,
    range: TrimRange,
    warning: Option<DurationWarning>,
    cover: CoverSelection,
    generation: u64,
    pending: bool,
}

impl TrimPlanner {
    /// Start planning for a freshly probed source.
    pub fn load(source: MediaSource) -> Self {
        let (range, warning) = DurationPolicy::initial_window(source.total_duration_seconds());
        if let Some(w) = &warning {
            warn!(total = w.total_duration, "Source exceeds maximum duration, trim required");
        }
        Self {
            source,
            range,
            warning,
            cover: CoverSelection::at(range.start()),
            generation: 1,
            pending: true,
        }
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn range(&self) -> TrimRange {
        self.range
    }

    pub fn warning(&self) -> Option<&DurationWarning> {
        self.warning.as_ref()
    }

    pub fn cover(&self) -> &CoverSelection {
        &self.cover
    }

    pub fn set_start(&mut self, start: f64) -> TrimRange {
        self.adjust(start, self.range.end(), ActiveEdge::Start)
    }

    pub fn set_end(&mut self, end: f64) -> TrimRange {
        self.adjust(self.range.start(), end, ActiveEdge::End)
    }

    fn adjust(&mut self, start: f64, end: f64, edge: ActiveEdge) -> TrimRange {
        self.range = DurationPolicy::clamp_window(
            start,
            end,
            self.source.total_duration_seconds(),
            edge,
        );
        if !DurationPolicy::exceeds(self.range.duration()) {
            self.warning = None;
        }
        // The window may have left the cover behind.
        if self.cover.retarget(self.cover.time(), &self.range) {
            self.bump_generation();
        }
        debug!(range = %self.range, ?edge, "Trim window adjusted");
        self.range
    }

    /// Move the cover timestamp. Returns the extraction to run, if any.
    pub fn set_cover_time(&mut self, time: f64) -> Option<CoverRequest> {
        if self.cover.retarget(time, &self.range) {
            self.bump_generation();
        }
        self.cover_request()
    }

    fn bump_generation(&mut self) {
        self.generation += 1;
        self.pending = true;
    }

    /// The extraction the current cover time still needs.
    pub fn cover_request(&self) -> Option<CoverRequest> {
        self.pending.then_some(CoverRequest {
            generation: self.generation,
            time: self.cover.time(),
        })
    }

    /// Apply an extraction result. Returns true if the image was replaced.
    ///
    /// Stale results are dropped. Failures keep the previous image.
    pub fn complete_cover(&mut self, request: CoverRequest, result: MediaResult<CoverImage>) -> bool {
        if request.generation != self.generation {
            debug!(time = request.time, "Dropping stale cover frame");
            return false;
        }
        self.pending = false;
        match result {
            Ok(image) => {
                self.cover.set_image(image);
                true
            }
            Err(e) => {
                warn!(time = request.time, error = %e, "Cover extraction failed, keeping previous frame");
                false
            }
        }
    }

    /// Run the pending extraction, if any, against `extractor`.
    pub async fn refresh_cover(&mut self, extractor: &dyn FrameExtractor) -> bool {
        let Some(request) = self.cover_request() else {
            return false;
        };
        let result = extractor.extract_frame(&self.source, request.time).await;
        self.complete_cover(request, result)
    }

    /// The single hard gate before metadata entry.
    pub fn can_continue(&self) -> bool {
        self.warning.is_none() && !DurationPolicy::exceeds(self.range.duration())
    }

    /// Validate the window for hand-off.
    pub fn output(&self) -> Result<TrimOutput, ValidationError> {
        if let Some(w) = &self.warning {
            return Err(ValidationError::TrimRequired {
                total: w.total_duration,
                max: w.max_duration,
            });
        }
        let range = DurationPolicy::check_window(
            self.range.start(),
            self.range.end(),
            self.source.total_duration_seconds(),
        )?;
        Ok(TrimOutput {
            range,
            cover: self.cover.image().cloned(),
        })
    }

    pub fn snapshot(&self) -> TrimSnapshot {
        TrimSnapshot {
            total_duration: self.source.total_duration_seconds(),
            range: self.range,
            warning: self.warning,
            cover_time: self.cover.time(),
            has_cover_image: self.cover.image().is_some(),
            can_continue: self.can_continue(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source(duration: f64) -> MediaSource {
        MediaSource::new("/clips/take.mp4", duration, "mp4").unwrap()
    }

    struct CountingExtractor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FrameExtractor for CountingExtractor {
        async fn extract_frame(&self, _source: &MediaSource, time: f64) -> MediaResult<CoverImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MediaError::invalid_video("decode error"))
            } else {
                Ok(CoverImage::jpeg(vec![0xFF, 0xD8, 0xFF], time))
            }
        }
    }

    #[test]
    fn test_short_source_can_continue() {
        let planner = TrimPlanner::load(source(12.0));
        assert_eq!(planner.range().end(), 12.0);
        assert!(planner.warning().is_none());
        assert!(planner.can_continue());
        assert_eq!(planner.output().unwrap().range.duration(), 12.0);
    }

    #[test]
    fn test_long_source_blocks_until_adjusted() {
        let mut planner = TrimPlanner::load(source(45.0));
        assert_eq!(planner.range().start(), 0.0);
        assert_eq!(planner.range().end(), 30.0);
        assert!(planner.warning().is_some());
        assert!(!planner.can_continue());
        assert!(matches!(
            planner.output(),
            Err(ValidationError::TrimRequired { .. })
        ));

        let range = planner.set_end(40.0);
        assert_eq!(range.start(), 10.0);
        assert_eq!(range.end(), 40.0);
        assert!(planner.can_continue());
        assert!(planner.output().is_ok());
    }

    #[test]
    fn test_start_drag_pulls_end_in() {
        let mut planner = TrimPlanner::load(source(45.0));
        planner.set_end(45.0);
        let range = planner.set_start(2.0);
        assert_eq!(range.start(), 2.0);
        assert_eq!(range.end(), 32.0);
    }

    #[test]
    fn test_cover_follows_window() {
        let mut planner = TrimPlanner::load(source(45.0));
        planner.set_cover_time(5.0);
        planner.set_end(40.0);
        // Window is now [10, 40], so the cover snaps to its start.
        assert_eq!(planner.cover().time(), 10.0);
        assert_eq!(planner.cover_request().map(|r| r.time()), Some(10.0));
    }

    #[test]
    fn test_stale_cover_dropped() {
        let mut planner = TrimPlanner::load(source(20.0));
        let first = planner.set_cover_time(3.0).unwrap();
        let second = planner.set_cover_time(6.0).unwrap();

        assert!(!planner.complete_cover(first, Ok(CoverImage::jpeg(vec![1u8], 3.0))));
        assert!(planner.cover().image().is_none());

        assert!(planner.complete_cover(second, Ok(CoverImage::jpeg(vec![2u8], 6.0))));
        assert_eq!(planner.cover().image().unwrap().time(), 6.0);
        assert!(planner.cover_request().is_none());
    }

    #[tokio::test]
    async fn test_refresh_cover() {
        let extractor = CountingExtractor {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let mut planner = TrimPlanner::load(source(20.0));
        assert!(planner.refresh_cover(&extractor).await);
        // Nothing pending, no second extraction.
        assert!(!planner.refresh_cover(&extractor).await);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

        planner.set_cover_time(4.0);
        assert!(planner.refresh_cover(&extractor).await);
        let out = planner.output().unwrap();
        assert_eq!(out.cover.unwrap().time(), 4.0);
    }

    #[tokio::test]
    async fn test_failed_extraction_keeps_previous_image() {
        let ok = CountingExtractor {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let failing = CountingExtractor {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let mut planner = TrimPlanner::load(source(20.0));
        planner.refresh_cover(&ok).await;

        planner.set_cover_time(8.0);
        assert!(!planner.refresh_cover(&failing).await);
        assert_eq!(planner.cover().time(), 8.0);
        assert_eq!(planner.cover().image().unwrap().time(), 0.0);
        assert!(planner.can_continue());
    }

    #[test]
    fn test_snapshot() {
        let planner = TrimPlanner::load(source(45.0));
        let snap = planner.snapshot();
        assert_eq!(snap.total_duration, 45.0);
        assert!(!snap.can_continue);
        assert!(!snap.has_cover_image);
    }
}
