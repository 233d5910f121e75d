//! Shared data models for the NextPlay capture-to-publish core.
//!
//! This crate provides Serde-serializable types for:
//! - Media sources, trim windows and cover selections
//! - The maximum-duration policy
//! - Upload metadata snapshots
//! - Server-issued upload sessions and video descriptors

pub mod media;
pub mod metadata;
pub mod trim;
pub mod validation;
pub mod video;

// Re-export common types
pub use media::{mime_for_container, CoverImage, CoverSelection, MediaSource};
pub use metadata::{Category, MetadataDraft, UploadMetadata, Visibility, MAX_TAGS, MAX_TITLE_CHARS};
pub use trim::{
    ActiveEdge, DurationPolicy, DurationWarning, TrimRange, MAX_DURATION_SECONDS,
    MIN_WINDOW_SECONDS,
};
pub use validation::ValidationError;
pub use video::{
    FeedItem, ProcessingState, PublishedVideo, SessionId, UploadSessionHandle, VideoDescriptor,
    VideoId,
};
