//! Media handle abstraction.
//!
//! The pipeline never talks to a decoder directly. It drives a
//! [`MediaSource`]: a seekable handle that exposes the clip's duration and
//! native size, moves its single decode position with
//! [`seek_to`](MediaSource::seek_to), and copies the picture at that position
//! with [`capture`](MediaSource::capture). [`ResourceLoader`] resolves a video
//! identifier into such a handle.
//!
//! [`FfmpegLoader`](crate::FfmpegLoader) is the production implementation;
//! any other decoder (or a synthetic source in tests) can be plugged in by
//! implementing these two traits.

use std::time::Duration;

use image::RgbaImage;

use crate::error::PreviewError;

/// Metadata read when a media handle is opened. No frame content is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Clip length in seconds.
    pub duration: f64,
    /// Native frame width in pixels.
    pub width: u32,
    /// Native frame height in pixels.
    pub height: u32,
}

/// A decodable, seekable video resource.
///
/// A source has exactly one decode position. Callers must let each
/// [`seek_to`](MediaSource::seek_to) return before issuing the next, which the
/// `&mut self` receiver enforces.
///
/// Dropping the source releases every resource it holds.
pub trait MediaSource {
    /// Metadata read at open time.
    fn info(&self) -> &MediaInfo;

    /// Move the decode position to `timestamp` (seconds) and return once a
    /// picture at or after that position has been decoded.
    ///
    /// # Errors
    ///
    /// Implementations must give up after `timeout` with
    /// [`PreviewError::SeekTimeout`]; decode failures surface as
    /// [`PreviewError::VideoDecode`].
    fn seek_to(&mut self, timestamp: f64, timeout: Duration) -> Result<(), PreviewError>;

    /// Returns `true` once the most recent seek has settled and a picture can
    /// be captured. A failed or pending seek clears readiness.
    fn is_ready(&self) -> bool;

    /// Copy the picture at the current decode position into a freshly
    /// allocated `width × height` RGBA image, resampling as needed.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::VideoDecode`] if no seek has settled yet or
    /// the picture cannot be converted.
    fn capture(&mut self, width: u32, height: u32) -> Result<RgbaImage, PreviewError>;
}

impl<S: MediaSource + ?Sized> MediaSource for Box<S> {
    fn info(&self) -> &MediaInfo {
        (**self).info()
    }

    fn seek_to(&mut self, timestamp: f64, timeout: Duration) -> Result<(), PreviewError> {
        (**self).seek_to(timestamp, timeout)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn capture(&mut self, width: u32, height: u32) -> Result<RgbaImage, PreviewError> {
        (**self).capture(width, height)
    }
}

/// Resolves a video identifier or locator into an opened [`MediaSource`].
pub trait ResourceLoader {
    /// The handle type this loader produces.
    type Source: MediaSource;

    /// Open `locator` and read its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::VideoLoad`] if the resource cannot be resolved,
    /// opened, or has no readable video metadata.
    fn open(&self, locator: &str, timeout: Duration) -> Result<Self::Source, PreviewError>;
}
