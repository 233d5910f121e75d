//! Capture-to-publish orchestration.
//!
//! This crate provides:
//! - The upload session state machine with global progress bands
//! - The processing poller, publish step and settle delay
//! - The orchestrator exposing one observable flow state
//! - Cooperative cancellation and per-attempt structured logging

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod poller;
pub mod progress;
pub mod session;

pub use cancel::CancelHandle;
pub use config::UploadConfig;
pub use error::{FailureReason, UploadError, UploadResult};
pub use logging::UploadLogger;
pub use orchestrator::{OrchestratorState, StateObserver, UploadOrchestrator};
pub use poller::ProcessingPoller;
pub use progress::UploadProgress;
pub use session::{SessionObserver, SessionState, UploadOutcome, UploadSession};
