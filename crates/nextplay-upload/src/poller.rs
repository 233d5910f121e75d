//! Processing poller and publish step.

use std::time::Duration;

use nextplay_client::{metrics::record_poll, AnalyticsEvent, ApiClient};
use nextplay_models::{ProcessingState, PublishedVideo, VideoDescriptor, VideoId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cancel::{cancellable, cancellable_sleep};
use crate::config::UploadConfig;
use crate::error::{UploadError, UploadResult};

/// Waits for server-side processing, then publishes.
#[derive(Clone)]
pub struct ProcessingPoller {
    client: ApiClient,
    interval: Duration,
    max_attempts: u32,
    settle_delay: Duration,
}

impl ProcessingPoller {
    pub fn new(client: ApiClient, config: &UploadConfig) -> Self {
        Self {
            client,
            interval: config.poll_interval,
            max_attempts: config.poll_max_attempts.max(1),
            settle_delay: config.settle_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Poll `GET /videos/{id}/status` until the video is ready.
    ///
    /// The first check is immediate, later ones wait `interval`. Returns the
    /// number of checks made. Running out of attempts yields
    /// [`UploadError::ProcessingTimeout`], which is distinct from a
    /// processing failure reported by the server. Only `processing`
    /// responses spend the budget; a failed check ends the wait with
    /// [`UploadError::StatusCheck`].
    pub async fn wait_until_ready<F>(
        &self,
        video_id: &VideoId,
        cancel: &mut watch::Receiver<bool>,
        mut on_attempt: F,
    ) -> UploadResult<u32>
    where
        F: FnMut(u32, u32),
    {
        for attempt in 1..=self.max_attempts {
            if attempt > 1 && !cancellable_sleep(cancel, self.interval).await {
                return Err(UploadError::Cancelled);
            }
            on_attempt(attempt, self.max_attempts);

            let status = match cancellable(cancel, self.client.processing_status(video_id)).await {
                None => return Err(UploadError::Cancelled),
                Some(status) => status,
            };
            match status {
                Ok(status) => {
                    record_poll(status.state.as_str());
                    match status.state {
                        ProcessingState::Completed => {
                            info!(video_id = %video_id, attempt, "Processing completed");
                            return Ok(attempt);
                        }
                        ProcessingState::Failed => {
                            let message = status
                                .message
                                .unwrap_or_else(|| "Video processing failed".to_string());
                            return Err(UploadError::ProcessingFailed(message));
                        }
                        ProcessingState::Processing => {
                            debug!(video_id = %video_id, attempt, max = self.max_attempts, "Still processing");
                        }
                    }
                }
                Err(e) => {
                    record_poll("error");
                    warn!(video_id = %video_id, attempt, error = %e, "Status check failed");
                    return Err(UploadError::StatusCheck(e));
                }
            }
        }

        warn!(video_id = %video_id, attempts = self.max_attempts, "Processing did not finish in time");
        Err(UploadError::ProcessingTimeout {
            attempts: self.max_attempts,
        })
    }

    /// Publish the processed video to the feed.
    pub async fn finalize(&self, video_id: &VideoId, descriptor: VideoDescriptor) -> UploadResult<PublishedVideo> {
        self.client.track(AnalyticsEvent::publish_tapped(video_id));

        let response = self
            .client
            .publish_video(video_id)
            .await
            .map_err(|e| UploadError::Publish(e.server_message()))?;
        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "Failed to publish video".to_string());
            return Err(UploadError::Publish(message));
        }

        self.client.track(AnalyticsEvent::publish_completed(video_id));
        info!(video_id = %video_id, "Video published");
        Ok(PublishedVideo {
            video_id: video_id.clone(),
            descriptor,
            feed_item: response.feed_item,
        })
    }

    /// Fixed pause after publish so the feed can index the post.
    pub async fn settle(&self, cancel: &mut watch::Receiver<bool>) -> UploadResult<()> {
        if self.settle_delay.is_zero() {
            return Ok(());
        }
        debug!(delay_ms = self.settle_delay.as_millis() as u64, "Waiting for feed to settle");
        if cancellable_sleep(cancel, self.settle_delay).await {
            Ok(())
        } else {
            Err(UploadError::Cancelled)
        }
    }

    /// Wait, publish, settle. Skips polling when completion already reported
    /// the video ready.
    pub async fn run<F>(
        &self,
        descriptor: VideoDescriptor,
        cancel: &mut watch::Receiver<bool>,
        on_attempt: F,
    ) -> UploadResult<PublishedVideo>
    where
        F: FnMut(u32, u32),
    {
        let video_id = descriptor.video_id.clone();
        if !descriptor.is_ready() {
            self.wait_until_ready(&video_id, cancel, on_attempt).await?;
        }
        let published = self.finalize(&video_id, descriptor).await?;
        self.settle(cancel).await?;
        Ok(published)
    }
}
