//! Error types for the `loopclip` crate.
//!
//! This module defines [`PreviewError`], the unified error type returned by
//! every fallible operation in the crate. Variants carry the timestamp, stage,
//! or locator involved so callers can build user-facing messages without
//! re-deriving context.

use std::{io::Error as IoError, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

use crate::publish::PublishError;

/// The unified error type for all `loopclip` operations.
///
/// Apart from the single "too few unique frames" retry performed by
/// [`RetryController`](crate::RetryController), every variant is terminal
/// for the invocation that produced it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PreviewError {
    /// The video resource could not be opened or its metadata could not be read.
    #[error("Failed to load video {locator}: {reason}")]
    VideoLoad {
        /// Locator passed to the resource loader.
        locator: String,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The media reported a duration that cannot be sampled.
    #[error("Invalid media duration: {0}s")]
    InvalidDuration(f64),

    /// A seek did not settle within the configured bound.
    #[error("Seek to {timestamp:.3}s did not settle within {timeout:?}")]
    SeekTimeout {
        /// Target timestamp in seconds.
        timestamp: f64,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// A frame could not be decoded or captured at the current position.
    #[error("Failed to decode video frame: {0}")]
    VideoDecode(String),

    /// Fewer visually distinct frames than required, even after the retry pass.
    #[error("Only {found} unique frame(s) found, at least {required} required")]
    InsufficientFrames {
        /// Unique frames accepted by the final pass.
        found: usize,
        /// Minimum the pipeline was configured with.
        required: usize,
    },

    /// The encoder session failed or timed out.
    #[error("GIF encoding error: {0}")]
    Encoding(String),

    /// A [`PreviewOptions`](crate::PreviewOptions) value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The publisher collaborator failed. Passed through unmodified.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl From<FfmpegError> for PreviewError {
    fn from(error: FfmpegError) -> Self {
        PreviewError::Ffmpeg(error.to_string())
    }
}
