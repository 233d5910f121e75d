//! Capture-to-publish orchestrator.
//!
//! Owns the externally observable flow state and drives the planner,
//! upload session and processing poller in order. State is published on a
//! `watch` channel; every change also goes to an optional observer so no
//! intermediate value is lost to coalescing.

use std::path::Path;
use std::sync::Arc;

use nextplay_client::ApiClient;
use nextplay_media::{
    record_clip, CaptureDevice, ExportProgressCallback, FrameExtractor, MediaError, MediaProbe,
    TrimExporter, TrimOutput, TrimPlanner, TrimSnapshot,
};
use nextplay_models::{MediaSource, MetadataDraft, PublishedVideo, TrimRange};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cancel::CancelHandle;
use crate::config::UploadConfig;
use crate::error::{FailureReason, UploadError, UploadResult};
use crate::poller::ProcessingPoller;
use crate::session::{check_file_size, SessionState, UploadSession};

/// What a presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    ChoosingSource,
    Recording {
        elapsed_secs: f64,
        remaining_secs: f64,
    },
    Importing,
    Trimming(TrimSnapshot),
    EnteringMetadata {
        range: TrimRange,
        has_cover: bool,
    },
    /// Global progress on a 0-100 scale.
    Uploading {
        progress: f64,
    },
    Processing {
        attempt: u32,
        max_attempts: u32,
    },
    Succeeded(PublishedVideo),
    Failed {
        reason: FailureReason,
        message: String,
        /// The video may still show up later.
        non_destructive: bool,
    },
    /// Control handed back to the caller.
    Closed,
}

impl OrchestratorState {
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorState::ChoosingSource => "choosing_source",
            OrchestratorState::Recording { .. } => "recording",
            OrchestratorState::Importing => "importing",
            OrchestratorState::Trimming(_) => "trimming",
            OrchestratorState::EnteringMetadata { .. } => "entering_metadata",
            OrchestratorState::Uploading { .. } => "uploading",
            OrchestratorState::Processing { .. } => "processing",
            OrchestratorState::Succeeded(_) => "succeeded",
            OrchestratorState::Failed { .. } => "failed",
            OrchestratorState::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorState::Succeeded(_) | OrchestratorState::Failed { .. } | OrchestratorState::Closed
        )
    }
}

/// Observer invoked synchronously on every state change.
pub type StateObserver = Arc<dyn Fn(&OrchestratorState) + Send + Sync + 'static>;

/// Cloneable sink for state changes, usable from progress callbacks.
#[derive(Clone)]
struct StatePublisher {
    tx: Arc<watch::Sender<OrchestratorState>>,
    observer: Option<StateObserver>,
}

impl StatePublisher {
    fn publish(&self, state: OrchestratorState) {
        if let Some(observer) = &self.observer {
            observer(&state);
        }
        self.tx.send_replace(state);
    }

    fn current(&self) -> OrchestratorState {
        self.tx.borrow().clone()
    }
}

/// Where an error surfaced, which decides what cancellation means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uploading,
    Processing,
}

/// Drives one user through source selection, trimming, metadata,
/// upload and processing.
pub struct UploadOrchestrator {
    client: ApiClient,
    config: UploadConfig,
    probe: Arc<dyn MediaProbe>,
    extractor: Arc<dyn FrameExtractor>,
    exporter: Option<Arc<dyn TrimExporter>>,
    cancel: CancelHandle,
    publisher: StatePublisher,
    planner: Option<TrimPlanner>,
    trim: Option<TrimOutput>,
}

impl UploadOrchestrator {
    pub fn new(
        client: ApiClient,
        config: UploadConfig,
        probe: Arc<dyn MediaProbe>,
        extractor: Arc<dyn FrameExtractor>,
    ) -> Self {
        let (tx, _) = watch::channel(OrchestratorState::ChoosingSource);
        Self {
            client,
            config,
            probe,
            extractor,
            exporter: None,
            cancel: CancelHandle::new(),
            publisher: StatePublisher {
                tx: Arc::new(tx),
                observer: None,
            },
            planner: None,
            trim: None,
        }
    }

    /// Re-encode the trim window before upload when `export_trim` is set.
    pub fn with_exporter(mut self, exporter: Arc<dyn TrimExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&OrchestratorState) + Send + Sync + 'static,
    {
        self.publisher.observer = Some(Arc::new(observer));
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.publisher.tx.subscribe()
    }

    pub fn state(&self) -> OrchestratorState {
        self.publisher.current()
    }

    /// Aborts whatever the orchestrator is currently awaiting.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn planner(&self) -> Option<&TrimPlanner> {
        self.planner.as_ref()
    }

    fn set_state(&self, next: OrchestratorState) {
        debug!(from = self.publisher.current().name(), to = next.name(), "Orchestrator transition");
        self.publisher.publish(next);
    }

    fn require(&self, allowed: bool, to: &str) -> UploadResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(UploadError::InvalidTransition {
                from: self.state().name().to_string(),
                to: to.to_string(),
            })
        }
    }

    fn discard_all(&mut self) {
        self.planner = None;
        self.trim = None;
    }

    fn trimming_snapshot(&self) -> UploadResult<TrimSnapshot> {
        self.planner
            .as_ref()
            .map(TrimPlanner::snapshot)
            .ok_or_else(|| UploadError::InvalidTransition {
                from: self.state().name().to_string(),
                to: "trimming".to_string(),
            })
    }

    fn fail_source(&mut self, err: MediaError) -> UploadError {
        let err = UploadError::Source(err);
        self.discard_all();
        self.set_failed(&err);
        err
    }

    fn set_failed(&self, err: &UploadError) {
        if let Some(reason) = err.failure_reason() {
            self.set_state(OrchestratorState::Failed {
                reason,
                message: err.user_message(),
                non_destructive: err.is_non_destructive(),
            });
        }
    }

    // =========================================================================
    // Source selection
    // =========================================================================

    /// Probe an existing file and move to trimming.
    pub async fn import(&mut self, path: impl AsRef<Path>) -> UploadResult<TrimSnapshot> {
        self.require(
            matches!(self.state(), OrchestratorState::ChoosingSource),
            "importing",
        )?;
        self.set_state(OrchestratorState::Importing);

        let path = path.as_ref();
        info!(path = %path.display(), "Importing video");
        match self.probe.probe(path).await {
            Ok(source) => self.load_source(source).await,
            Err(e) => Err(self.fail_source(e)),
        }
    }

    /// Record a clip from `device` until `stop` is raised or the countdown
    /// runs out. Cancelling discards the clip and returns to source choice.
    pub async fn record(
        &mut self,
        device: &dyn CaptureDevice,
        stop: watch::Receiver<bool>,
    ) -> UploadResult<TrimSnapshot> {
        self.require(
            matches!(self.state(), OrchestratorState::ChoosingSource),
            "recording",
        )?;
        self.cancel.reset();
        let limits = self.config.recording;
        self.set_state(OrchestratorState::Recording {
            elapsed_secs: 0.0,
            remaining_secs: limits.max.as_secs_f64(),
        });

        let publisher = self.publisher.clone();
        let recorded = record_clip(device, limits, stop, self.cancel.subscribe(), move |tick| {
            publisher.publish(OrchestratorState::Recording {
                elapsed_secs: tick.elapsed.as_secs_f64(),
                remaining_secs: tick.remaining.as_secs_f64(),
            });
        })
        .await;

        match recorded {
            Ok(source) => self.load_source(source).await,
            Err(MediaError::Cancelled) => {
                info!("Recording cancelled");
                self.set_state(OrchestratorState::ChoosingSource);
                Err(UploadError::Cancelled)
            }
            Err(e) => Err(self.fail_source(e)),
        }
    }

    /// Start trimming a probed source. Extracts the initial cover frame.
    pub async fn load_source(&mut self, source: MediaSource) -> UploadResult<TrimSnapshot> {
        self.require(
            matches!(
                self.state(),
                OrchestratorState::ChoosingSource
                    | OrchestratorState::Importing
                    | OrchestratorState::Recording { .. }
            ),
            "trimming",
        )?;

        let mut planner = TrimPlanner::load(source);
        planner.refresh_cover(self.extractor.as_ref()).await;
        let snapshot = planner.snapshot();
        self.planner = Some(planner);
        self.trim = None;
        self.set_state(OrchestratorState::Trimming(snapshot.clone()));
        Ok(snapshot)
    }

    // =========================================================================
    // Trimming
    // =========================================================================

    fn planner_for_trimming(&mut self) -> UploadResult<&mut TrimPlanner> {
        let trimming = matches!(self.state(), OrchestratorState::Trimming(_));
        let from = self.state().name();
        match self.planner.as_mut() {
            Some(planner) if trimming => Ok(planner),
            _ => Err(UploadError::InvalidTransition {
                from: from.to_string(),
                to: "trimming".to_string(),
            }),
        }
    }

    pub fn set_trim_start(&mut self, start: f64) -> UploadResult<TrimSnapshot> {
        self.planner_for_trimming()?.set_start(start);
        self.publish_trimming()
    }

    pub fn set_trim_end(&mut self, end: f64) -> UploadResult<TrimSnapshot> {
        self.planner_for_trimming()?.set_end(end);
        self.publish_trimming()
    }

    /// Move the cover and extract the new frame. Extraction failures keep
    /// the previous image.
    pub async fn set_cover_time(&mut self, time: f64) -> UploadResult<TrimSnapshot> {
        let extractor = Arc::clone(&self.extractor);
        let planner = self.planner_for_trimming()?;
        if planner.set_cover_time(time).is_some() {
            planner.refresh_cover(extractor.as_ref()).await;
        }
        self.publish_trimming()
    }

    fn publish_trimming(&self) -> UploadResult<TrimSnapshot> {
        let snapshot = self.trimming_snapshot()?;
        self.set_state(OrchestratorState::Trimming(snapshot.clone()));
        Ok(snapshot)
    }

    /// The Continue gate. A window over the ceiling is rejected and the
    /// flow stays in trimming.
    pub async fn continue_to_metadata(&mut self) -> UploadResult<TrimOutput> {
        let extractor = Arc::clone(&self.extractor);
        let planner = self.planner_for_trimming()?;
        // The window may have moved the cover since the last extraction.
        planner.refresh_cover(extractor.as_ref()).await;
        let output = planner.output()?;

        self.set_state(OrchestratorState::EnteringMetadata {
            range: output.range,
            has_cover: output.cover.is_some(),
        });
        self.trim = Some(output.clone());
        Ok(output)
    }

    /// Step back one screen. Only allowed before upload starts.
    pub fn back(&mut self) -> UploadResult<()> {
        match self.state() {
            OrchestratorState::Trimming(_) => {
                self.discard_all();
                self.set_state(OrchestratorState::ChoosingSource);
                Ok(())
            }
            OrchestratorState::EnteringMetadata { .. } => {
                self.trim = None;
                self.publish_trimming().map(|_| ())
            }
            other => Err(UploadError::InvalidTransition {
                from: other.name().to_string(),
                to: "back".to_string(),
            }),
        }
    }

    // =========================================================================
    // Upload and processing
    // =========================================================================

    /// Commit metadata and run upload, processing, publish and settle.
    ///
    /// Validation problems are returned without leaving metadata entry and
    /// without any network call.
    pub async fn commit_metadata_and_upload(&mut self, draft: &MetadataDraft) -> UploadResult<PublishedVideo> {
        self.require(
            matches!(self.state(), OrchestratorState::EnteringMetadata { .. }),
            "uploading",
        )?;
        let (trim, source) = match (&self.trim, &self.planner) {
            (Some(trim), Some(planner)) => (trim.clone(), planner.source().clone()),
            _ => {
                return Err(UploadError::InvalidTransition {
                    from: self.state().name().to_string(),
                    to: "uploading".to_string(),
                })
            }
        };

        let metadata = draft.commit(trim.range.duration(), trim.cover.clone())?;
        check_file_size(&source, self.config.max_file_bytes).await?;
        if self.client.is_upload_active() {
            return Err(UploadError::AlreadyInProgress);
        }

        self.cancel.reset();
        let mut cancel_rx = self.cancel.subscribe();
        self.set_state(OrchestratorState::Uploading { progress: 0.0 });

        let exported = match self.export_if_needed(&source, trim.range, cancel_rx.clone()).await {
            Ok(exported) => exported,
            Err(e) => return Err(self.settle_error(e, Phase::Uploading)),
        };
        let media = exported.as_ref().unwrap_or(&source);

        let publisher = self.publisher.clone();
        let mut session = UploadSession::new(self.client.clone(), self.config.clone()).with_observer(
            move |state, progress| {
                if !matches!(state, SessionState::Failed(_) | SessionState::Cancelled) {
                    publisher.publish(OrchestratorState::Uploading { progress });
                }
            },
        );
        let outcome = session.run(&metadata, media, cancel_rx.clone()).await;

        if let Some(exported) = &exported {
            if let Err(e) = tokio::fs::remove_file(exported.path()).await {
                warn!(path = %exported.path().display(), error = %e, "Failed to remove exported trim");
            }
        }
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.settle_error(e, Phase::Uploading)),
        };

        let poller = ProcessingPoller::new(self.client.clone(), &self.config);
        self.set_state(OrchestratorState::Processing {
            attempt: 0,
            max_attempts: poller.max_attempts(),
        });
        let publisher = self.publisher.clone();
        let processed = poller
            .run(outcome.descriptor, &mut cancel_rx, |attempt, max_attempts| {
                publisher.publish(OrchestratorState::Processing { attempt, max_attempts });
            })
            .await;

        match processed {
            Ok(published) => {
                info!(video_id = %published.video_id, "Upload flow succeeded");
                self.set_state(OrchestratorState::Succeeded(published.clone()));
                Ok(published)
            }
            Err(e) => Err(self.settle_error(e, Phase::Processing)),
        }
    }

    async fn export_if_needed(
        &self,
        source: &MediaSource,
        range: TrimRange,
        cancel: watch::Receiver<bool>,
    ) -> UploadResult<Option<MediaSource>> {
        let Some(exporter) = self.exporter.as_ref().filter(|_| self.config.export_trim) else {
            return Ok(None);
        };
        if range.covers(source.total_duration_seconds()) {
            return Ok(None);
        }

        let on_progress: ExportProgressCallback = Box::new(|fraction| {
            debug!(fraction, "Trim export progress");
        });
        match exporter.export_trim(source, range, cancel, Some(on_progress)).await {
            Ok(exported) => Ok(Some(exported)),
            Err(MediaError::Cancelled) => Err(UploadError::Cancelled),
            Err(e) => Err(UploadError::Export(e)),
        }
    }

    /// Map an error from upload or processing onto the visible state.
    fn settle_error(&mut self, err: UploadError, phase: Phase) -> UploadError {
        match &err {
            UploadError::Validation(_) | UploadError::AlreadyInProgress => {
                // Nothing left the device; stay on metadata entry.
                if let Some(trim) = &self.trim {
                    self.set_state(OrchestratorState::EnteringMetadata {
                        range: trim.range,
                        has_cover: trim.cover.is_some(),
                    });
                }
            }
            e if e.is_cancelled() => {
                self.discard_all();
                match phase {
                    Phase::Uploading => self.set_state(OrchestratorState::ChoosingSource),
                    // Processing continues server-side; the video may still appear.
                    Phase::Processing => self.set_state(OrchestratorState::Closed),
                }
            }
            e => {
                warn!(error = %e, "Upload flow failed");
                self.set_failed(e);
            }
        }
        err
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Start over from source selection, discarding trim, metadata and
    /// session state.
    pub fn retry(&mut self) -> UploadResult<()> {
        self.require(
            matches!(self.state(), OrchestratorState::Failed { .. }),
            "choosing_source",
        )?;
        self.discard_all();
        self.cancel.reset();
        self.set_state(OrchestratorState::ChoosingSource);
        Ok(())
    }

    /// Leave the flow without retrying.
    ///
    /// Raises the cancel flag so any work started through another handle
    /// stops, and closes from any state where nothing is in flight.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        match self.state() {
            OrchestratorState::Uploading { .. }
            | OrchestratorState::Processing { .. }
            | OrchestratorState::Recording { .. }
            | OrchestratorState::Importing => {
                debug!("Cancel requested while work is in flight");
            }
            OrchestratorState::Closed => {}
            _ => {
                self.discard_all();
                self.set_state(OrchestratorState::Closed);
            }
        }
    }

    /// Acknowledge a terminal outcome.
    pub fn dismiss(&mut self) -> UploadResult<()> {
        self.require(
            matches!(
                self.state(),
                OrchestratorState::Succeeded(_) | OrchestratorState::Failed { .. }
            ),
            "closed",
        )?;
        self.discard_all();
        self.set_state(OrchestratorState::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(OrchestratorState::ChoosingSource.name(), "choosing_source");
        assert_eq!(
            OrchestratorState::Uploading { progress: 40.0 }.name(),
            "uploading"
        );
        assert!(OrchestratorState::Closed.is_terminal());
        assert!(!OrchestratorState::Importing.is_terminal());
    }

    #[test]
    fn test_state_serializes_tagged() {
        let json = serde_json::to_value(OrchestratorState::Processing {
            attempt: 3,
            max_attempts: 60,
        })
        .unwrap();
        assert_eq!(json["state"], "processing");
        assert_eq!(json["attempt"], 3);

        let failed = serde_json::to_value(OrchestratorState::Failed {
            reason: FailureReason::ProcessingTimeout,
            message: "still processing".into(),
            non_destructive: true,
        })
        .unwrap();
        assert_eq!(failed["reason"], "processing_timeout");
        assert_eq!(failed["non_destructive"], true);
    }
}
