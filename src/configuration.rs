//! Preview configuration.
//!
//! [`PreviewOptions`] is a builder that carries the output knobs (size, frame
//! count, delay, palette quality, loop count) together with the operational
//! settings (timeouts, worker count, progress callback, cancellation token)
//! without widening every function signature.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use loopclip::{CancellationToken, PreviewOptions};
//!
//! let token = CancellationToken::new();
//! let options = PreviewOptions::new()
//!     .with_size(240, 240)
//!     .with_frame_count(12)
//!     .with_seek_timeout(Duration::from_secs(2))
//!     .with_cancellation(token.clone());
//!
//! assert!(options.validate().is_ok());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::encoder::EncoderConfig;
use crate::error::PreviewError;
use crate::planner::MAX_FRAME_COUNT;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Default output width and height in pixels.
pub const DEFAULT_DIMENSION: u32 = 320;
/// Default delay between frames in milliseconds.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;
/// Default palette quality index handed to the GIF quantizer.
pub const DEFAULT_PALETTE_QUALITY: i32 = 10;
/// Fewest unique frames a preview may contain.
pub const DEFAULT_MINIMUM_UNIQUE_FRAMES: usize = 3;

/// Settings for one preview run.
///
/// All fields have defaults matching the documented configuration surface:
/// 320×320 output, frame count derived from duration, 100 ms per frame,
/// palette quality 10, infinite looping.
#[derive(Clone)]
pub struct PreviewOptions {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// `None` derives the count from the source duration.
    pub(crate) frame_count: Option<usize>,
    pub(crate) frame_delay_ms: u32,
    pub(crate) palette_quality: i32,
    /// `0` loops forever.
    pub(crate) loop_count: u16,
    pub(crate) minimum_unique_frames: usize,
    pub(crate) seek_timeout: Duration,
    pub(crate) encode_timeout: Duration,
    pub(crate) open_timeout: Duration,
    pub(crate) encoder_workers: usize,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
}

impl Debug for PreviewOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PreviewOptions")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_count", &self.frame_count)
            .field("frame_delay_ms", &self.frame_delay_ms)
            .field("palette_quality", &self.palette_quality)
            .field("loop_count", &self.loop_count)
            .field("minimum_unique_frames", &self.minimum_unique_frames)
            .field("seek_timeout", &self.seek_timeout)
            .field("encode_timeout", &self.encode_timeout)
            .field("open_timeout", &self.open_timeout)
            .field("encoder_workers", &self.encoder_workers)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewOptions {
    /// Create options with the default settings.
    pub fn new() -> Self {
        Self {
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
            frame_count: None,
            frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            palette_quality: DEFAULT_PALETTE_QUALITY,
            loop_count: 0,
            minimum_unique_frames: DEFAULT_MINIMUM_UNIQUE_FRAMES,
            seek_timeout: Duration::from_secs(5),
            encode_timeout: Duration::from_secs(60),
            open_timeout: Duration::from_secs(15),
            encoder_workers: 2,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set the output frame size in pixels.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Request an explicit number of sampled frames instead of deriving it
    /// from the source duration.
    #[must_use]
    pub fn with_frame_count(mut self, count: usize) -> Self {
        self.frame_count = Some(count);
        self
    }

    /// Set the delay between frames in milliseconds.
    ///
    /// GIF stores delays in hundredths of a second, so the value is rounded
    /// to the nearest 10 ms when encoded.
    #[must_use]
    pub fn with_frame_delay_ms(mut self, delay: u32) -> Self {
        self.frame_delay_ms = delay;
        self
    }

    /// Set the palette quality index (1 = best colours, 30 = fastest).
    #[must_use]
    pub fn with_palette_quality(mut self, quality: i32) -> Self {
        self.palette_quality = quality;
        self
    }

    /// Set how many times the animation repeats. `0` loops forever.
    #[must_use]
    pub fn with_loop_count(mut self, count: u16) -> Self {
        self.loop_count = count;
        self
    }

    /// Set the fewest unique frames a preview may contain before the run
    /// retries (and, after the retry, fails).
    #[must_use]
    pub fn with_minimum_unique_frames(mut self, minimum: usize) -> Self {
        self.minimum_unique_frames = minimum;
        self
    }

    /// Bound every seek. A seek that has not settled in time fails the run
    /// with [`PreviewError::SeekTimeout`].
    #[must_use]
    pub fn with_seek_timeout(mut self, timeout: Duration) -> Self {
        self.seek_timeout = timeout;
        self
    }

    /// Bound the encode session.
    #[must_use]
    pub fn with_encode_timeout(mut self, timeout: Duration) -> Self {
        self.encode_timeout = timeout;
        self
    }

    /// Bound opening the resource and reading its metadata.
    #[must_use]
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Set the number of encoder worker threads.
    #[must_use]
    pub fn with_encoder_workers(mut self, workers: usize) -> Self {
        self.encoder_workers = workers;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled the run stops at the next checkpoint and
    /// returns [`PreviewError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires (every N items, minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Output frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Output frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Explicit frame count, if one was requested.
    pub fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }

    /// Seek bound.
    pub fn seek_timeout(&self) -> Duration {
        self.seek_timeout
    }

    /// Open bound.
    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    /// Check every setting against the range the pipeline and the GIF
    /// format accept.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidConfiguration`] naming the first
    /// offending setting.
    pub fn validate(&self) -> Result<(), PreviewError> {
        let invalid = |message: String| -> Result<(), PreviewError> {
            Err(PreviewError::InvalidConfiguration(message))
        };

        if self.width == 0 || self.height == 0 {
            return invalid(format!(
                "output size must be non-zero (got {}x{})",
                self.width, self.height
            ));
        }
        if self.width > u16::MAX as u32 || self.height > u16::MAX as u32 {
            return invalid(format!(
                "output size {}x{} exceeds the GIF limit of {}",
                self.width,
                self.height,
                u16::MAX
            ));
        }
        if let Some(count) = self.frame_count {
            if count == 0 || count > MAX_FRAME_COUNT * 10 {
                return invalid(format!(
                    "frame count must be between 1 and {} (got {count})",
                    MAX_FRAME_COUNT * 10
                ));
            }
        }
        if !(1..=30).contains(&self.palette_quality) {
            return invalid(format!(
                "palette quality must be between 1 and 30 (got {})",
                self.palette_quality
            ));
        }
        if self.frame_delay_ms / 10 > u16::MAX as u32 {
            return invalid(format!("frame delay {} ms is too long", self.frame_delay_ms));
        }
        if self.minimum_unique_frames == 0 {
            return invalid("minimum unique frames must be at least 1".to_string());
        }
        if let Some(count) = self.frame_count {
            if count < self.minimum_unique_frames {
                return invalid(format!(
                    "frame count {count} is below the minimum of {} unique frames",
                    self.minimum_unique_frames
                ));
            }
        }
        if self.encoder_workers == 0 {
            return invalid("encoder worker count must be at least 1".to_string());
        }
        if self.seek_timeout.is_zero()
            || self.encode_timeout.is_zero()
            || self.open_timeout.is_zero()
        {
            return invalid("timeouts must be non-zero".to_string());
        }
        Ok(())
    }

    /// The subset of settings the encoder needs.
    pub(crate) fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            width: self.width,
            height: self.height,
            frame_delay_ms: self.frame_delay_ms,
            palette_quality: self.palette_quality,
            loop_count: self.loop_count,
        }
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
