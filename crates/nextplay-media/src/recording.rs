//! Recording countdown and capture control.

use nextplay_models::{MediaSource, MAX_DURATION_SECONDS};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::capability::CaptureDevice;
use crate::error::{MediaError, MediaResult};

/// Timing for a recording countdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingLimits {
    /// Recording stops on its own after this long
    pub max: Duration,
    pub tick: Duration,
}

impl Default for RecordingLimits {
    fn default() -> Self {
        Self {
            max: Duration::from_secs_f64(MAX_DURATION_SECONDS),
            tick: Duration::from_millis(100),
        }
    }
}

/// Elapsed and remaining recording time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecordingTick {
    pub elapsed: Duration,
    pub remaining: Duration,
}

impl RecordingTick {
    pub fn is_expired(&self) -> bool {
        self.remaining.is_zero()
    }
}

/// Countdown task publishing a [`RecordingTick`] every `tick`.
///
/// The task is aborted when the timer is dropped, so no tick outlives the
/// recording that started it.
pub struct RecordingTimer {
    handle: JoinHandle<()>,
    ticks: watch::Receiver<RecordingTick>,
}

impl RecordingTimer {
    pub fn start(limits: RecordingLimits) -> Self {
        let (tx, ticks) = watch::channel(RecordingTick {
            elapsed: Duration::ZERO,
            remaining: limits.max,
        });
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(limits.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let elapsed = started.elapsed().min(limits.max);
                let tick = RecordingTick {
                    elapsed,
                    remaining: limits.max - elapsed,
                };
                if tx.send(tick).is_err() || tick.is_expired() {
                    break;
                }
            }
        });
        Self { handle, ticks }
    }

    pub fn subscribe(&self) -> watch::Receiver<RecordingTick> {
        self.ticks.clone()
    }

    pub fn latest(&self) -> RecordingTick {
        *self.ticks.borrow()
    }
}

impl Drop for RecordingTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    User,
    Limit,
    Cancelled,
}

/// Record one clip from `device`.
///
/// Stops when `stop` is raised or the countdown expires. Raising `cancel`
/// stops the device and discards the clip.
pub async fn record_clip<F>(
    device: &dyn CaptureDevice,
    limits: RecordingLimits,
    mut stop: watch::Receiver<bool>,
    mut cancel: watch::Receiver<bool>,
    on_tick: F,
) -> MediaResult<MediaSource>
where
    F: Fn(RecordingTick) + Send,
{
    device.start_capture().await?;
    info!(max_secs = limits.max.as_secs_f64(), "Recording started");

    let timer = RecordingTimer::start(limits);
    let mut ticks = timer.subscribe();
    let mut stop_open = true;
    let mut cancel_open = true;

    let reason = loop {
        if *cancel.borrow_and_update() {
            break StopReason::Cancelled;
        }
        if *stop.borrow_and_update() {
            break StopReason::User;
        }

        tokio::select! {
            biased;
            res = cancel.changed(), if cancel_open => {
                if res.is_err() {
                    cancel_open = false;
                }
            }
            res = stop.changed(), if stop_open => {
                if res.is_err() {
                    stop_open = false;
                }
            }
            res = ticks.changed() => {
                let tick = *ticks.borrow_and_update();
                on_tick(tick);
                if res.is_err() || tick.is_expired() {
                    break StopReason::Limit;
                }
            }
        }
    };
    drop(timer);

    debug!(?reason, "Recording stopping");
    let recorded = device.stop_capture().await;
    match reason {
        StopReason::Cancelled => Err(MediaError::Cancelled),
        StopReason::User | StopReason::Limit => recorded,
    }
}
