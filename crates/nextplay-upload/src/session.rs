//! Upload session state machine.
//!
//! Drives one attempt strictly in order: session init, media PUT, optional
//! thumbnail, completion. There is no automatic retry and no resume; a
//! retry is a fresh session from `Idle` with a new server handle.

use std::fmt;

use bytes::Bytes;
use nextplay_client::{AnalyticsEvent, ApiClient};
use nextplay_media::MediaError;
use nextplay_models::{MediaSource, UploadMetadata, UploadSessionHandle, ValidationError, VideoDescriptor};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, Instrument};

use crate::cancel::{cancellable, cancelled};
use crate::config::UploadConfig;
use crate::error::{FailureReason, UploadError, UploadResult};
use crate::logging::UploadLogger;
use crate::progress::{UploadProgress, COMPLETING, DONE, MEDIA_BAND_END, THUMBNAIL_DONE, THUMBNAIL_STARTED};

/// States of one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Initializing,
    UploadingMedia,
    UploadingThumbnail,
    Completing,
    Succeeded,
    Failed(FailureReason),
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Succeeded | SessionState::Failed(_) | SessionState::Cancelled
        )
    }

    /// The full transition table.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Initializing)
            | (Initializing, UploadingMedia)
            | (UploadingMedia, UploadingThumbnail)
            | (UploadingMedia, Completing)
            | (UploadingThumbnail, Completing)
            | (Completing, Succeeded) => true,
            (Initializing | UploadingMedia | UploadingThumbnail, Cancelled) => true,
            (from, Failed(_)) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::UploadingMedia => write!(f, "uploading_media"),
            SessionState::UploadingThumbnail => write!(f, "uploading_thumbnail"),
            SessionState::Completing => write!(f, "completing"),
            SessionState::Succeeded => write!(f, "succeeded"),
            SessionState::Failed(reason) => write!(f, "failed({})", reason),
            SessionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Callback invoked on every state or progress change.
pub type SessionObserver = Box<dyn Fn(SessionState, f64) + Send + Sync + 'static>;

/// Result of a successful attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub handle: UploadSessionHandle,
    pub descriptor: VideoDescriptor,
}

/// One upload attempt.
pub struct UploadSession {
    client: ApiClient,
    config: UploadConfig,
    state: SessionState,
    progress: UploadProgress,
    handle: Option<UploadSessionHandle>,
    observer: Option<SessionObserver>,
    logger: UploadLogger,
}

impl UploadSession {
    pub fn new(client: ApiClient, config: UploadConfig) -> Self {
        Self {
            client,
            config,
            state: SessionState::Idle,
            progress: UploadProgress::default(),
            handle: None,
            observer: None,
            logger: UploadLogger::new(),
        }
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(SessionState, f64) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress.value()
    }

    /// The server handle, held only while the attempt is live or succeeded.
    pub fn handle(&self) -> Option<&UploadSessionHandle> {
        self.handle.as_ref()
    }

    pub fn logger(&self) -> &UploadLogger {
        &self.logger
    }

    /// Back to `Idle` for an explicit retry: progress zeroed, handle dropped.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.progress.reset();
        self.handle = None;
        self.logger = UploadLogger::new();
        self.notify();
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer(self.state, self.progress.value());
        }
    }

    fn transition(&mut self, next: SessionState) -> UploadResult<()> {
        if !self.state.can_transition_to(&next) {
            return Err(UploadError::invalid_transition(self.state, next));
        }
        debug!(from = %self.state, to = %next, "Upload session transition");
        self.state = next;
        if matches!(next, SessionState::Failed(_) | SessionState::Cancelled) {
            self.handle = None;
        }
        self.notify();
        Ok(())
    }

    fn advance(&mut self, target: f64) {
        if self.progress.advance_to(target) {
            self.logger.log_progress(self.progress.value());
            self.notify();
        }
    }

    /// Move to a terminal state for `err` and hand it back.
    fn fail(&mut self, err: UploadError) -> UploadError {
        let next = match err.failure_reason() {
            Some(reason) => SessionState::Failed(reason),
            None if err.is_cancelled() => SessionState::Cancelled,
            None => return err,
        };
        if let Err(e) = self.transition(next) {
            debug!(error = %e, "Ignoring terminal transition");
        }
        if err.is_cancelled() {
            self.logger.log_warning("cancelled by user");
        } else {
            self.logger.log_error(&err.to_string());
            self.client.track(AnalyticsEvent::upload_failed(&err.to_string()));
        }
        err
    }

    /// Run the attempt to a terminal state.
    ///
    /// Local checks (file size, readability) run before any network call
    /// and leave the session in `Idle` when they fail.
    pub async fn run(
        &mut self,
        metadata: &UploadMetadata,
        media: &MediaSource,
        mut cancel: watch::Receiver<bool>,
    ) -> UploadResult<UploadOutcome> {
        if self.state != SessionState::Idle {
            return Err(UploadError::invalid_transition(self.state, SessionState::Initializing));
        }
        let _slot = self
            .client
            .try_begin_upload()
            .map_err(|_| UploadError::AlreadyInProgress)?;

        let data = self.read_media(media).await?;
        let span = self.logger.create_span();
        self.run_steps(metadata, media, data, &mut cancel)
            .instrument(span)
            .await
    }

    async fn read_media(&self, media: &MediaSource) -> UploadResult<Bytes> {
        check_file_size(media, self.config.max_file_bytes).await?;
        let data = tokio::fs::read(media.path())
            .await
            .map_err(|e| UploadError::Source(MediaError::Io(e)))?;
        Ok(Bytes::from(data))
    }

    async fn run_steps(
        &mut self,
        metadata: &UploadMetadata,
        media: &MediaSource,
        data: Bytes,
        cancel: &mut watch::Receiver<bool>,
    ) -> UploadResult<UploadOutcome> {
        let client = self.client.clone();

        // Initializing
        self.transition(SessionState::Initializing)?;
        self.logger.log_start(metadata.title());
        client.track(AnalyticsEvent::upload_started(
            metadata.category(),
            !metadata.tags().is_empty(),
        ));
        let handle = match cancellable(cancel, client.create_upload_session(metadata)).await {
            None => return Err(self.fail(UploadError::Cancelled)),
            Some(Err(e)) => return Err(self.fail(UploadError::Init(e))),
            Some(Ok(handle)) => handle,
        };
        self.logger.set_video_id(&handle.video_id);
        self.handle = Some(handle.clone());

        // UploadingMedia
        self.transition(SessionState::UploadingMedia)?;
        self.logger.log_step("uploading_media");
        if let Err(e) = self.upload_media(&client, &handle, media, data, cancel).await {
            return Err(self.fail(e));
        }
        self.advance(MEDIA_BAND_END);

        // UploadingThumbnail, only with a cover
        if let Some(cover) = metadata.cover() {
            self.transition(SessionState::UploadingThumbnail)?;
            self.logger.log_step("uploading_thumbnail");
            self.advance(THUMBNAIL_STARTED);
            match cancellable(cancel, client.upload_thumbnail(&handle.video_id, cover)).await {
                None => return Err(self.fail(UploadError::Cancelled)),
                Some(Err(e)) => return Err(self.fail(UploadError::Thumbnail(e))),
                Some(Ok(())) => self.advance(THUMBNAIL_DONE),
            }
        }

        // Completing is not cancellable.
        self.transition(SessionState::Completing)?;
        self.logger.log_step("completing");
        self.advance(COMPLETING);
        let descriptor = match client.complete_upload(&handle.session_id, &handle.video_id).await {
            Ok(d) => d,
            Err(e) => return Err(self.fail(UploadError::Completion(e))),
        };
        client.track(AnalyticsEvent::upload_completed(&handle.session_id));

        self.progress.advance_to(DONE);
        self.logger.log_progress(DONE);
        self.transition(SessionState::Succeeded)?;
        self.logger.log_completion("media uploaded");

        Ok(UploadOutcome { handle, descriptor })
    }

    async fn upload_media(
        &mut self,
        client: &ApiClient,
        handle: &UploadSessionHandle,
        media: &MediaSource,
        data: Bytes,
        cancel: &mut watch::Receiver<bool>,
    ) -> UploadResult<()> {
        let total = data.len() as u64;
        let (bytes_tx, mut bytes_rx) = watch::channel(0u64);
        let upload = client.upload_media(
            handle,
            data,
            media.mime_type(),
            self.config.upload_chunk_bytes,
            Some(bytes_tx),
        );
        tokio::pin!(upload);

        let mut progress_open = true;
        loop {
            tokio::select! {
                biased;
                _ = cancelled(cancel) => return Err(UploadError::Cancelled),
                res = &mut upload => return res.map_err(UploadError::MediaUpload),
                changed = bytes_rx.changed(), if progress_open => {
                    if changed.is_err() {
                        progress_open = false;
                        continue;
                    }
                    let sent = *bytes_rx.borrow_and_update();
                    if self.progress.advance_media(sent, total) {
                        self.notify();
                    }
                }
            }
        }
    }
}

/// Reject files over `max` bytes before anything touches the network.
pub(crate) async fn check_file_size(media: &MediaSource, max: u64) -> UploadResult<u64> {
    let size = tokio::fs::metadata(media.path())
        .await
        .map_err(|e| UploadError::Source(MediaError::Io(e)))?
        .len();
    if size > max {
        return Err(ValidationError::FileTooLarge { size, max }.into());
    }
    Ok(size)
}
