//! Local validation errors.
//!
//! These never reach the network: they are resolved in place by disabling
//! progression until the user fixes the input.

use thiserror::Error;

/// Input rejected before any network call is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Video duration must be a positive number of seconds (got {0})")]
    InvalidDuration(f64),

    #[error("Start time cannot be negative")]
    NegativeStart,

    #[error("End time must be after start time")]
    EndNotAfterStart,

    #[error("End time {end:.1}s exceeds video length {total:.1}s")]
    ExceedsSource { end: f64, total: f64 },

    #[error("Final video must be {max:.0} seconds or less (selected {duration:.1}s)")]
    WindowTooLong { duration: f64, max: f64 },

    #[error("Video is {total:.1}s. Please trim to {max:.0} seconds or less.")]
    TrimRequired { total: f64, max: f64 },

    #[error("Please enter a title")]
    MissingTitle,

    #[error("Title must be {max} characters or less")]
    TitleTooLong { max: usize },

    #[error("Please select a category")]
    MissingCategory,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("At most {max} tags are allowed")]
    TooManyTags { max: usize },

    #[error("Video file is {size} bytes, maximum allowed is {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid media source: {0}")]
    InvalidSource(String),
}

impl ValidationError {
    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }
}
