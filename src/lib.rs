//! # loopclip
//!
//! Turn exercise-demonstration videos into short looping GIF previews.
//!
//! `loopclip` samples a video at planned timestamps, drops frames that look
//! the same as one already kept, retries once at a denser fixed cadence when
//! the clip is too static, and encodes the surviving frames into an animated
//! GIF on a small worker pool. Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Encode a Preview
//!
//! ```no_run
//! use loopclip::PreviewOptions;
//!
//! let preview = loopclip::transcode("squat.mp4", &PreviewOptions::new()).unwrap();
//! std::fs::write("squat.gif", &preview.payload).unwrap();
//! println!("{} frames at {}x{}", preview.frame_count, preview.width, preview.height);
//! ```
//!
//! ### Publish It
//!
//! ```no_run
//! use loopclip::{
//!     DestinationKey, DirectoryPublisher, FfmpegLoader, PreviewOptions, PreviewPipeline,
//! };
//!
//! let pipeline = PreviewPipeline::new(PreviewOptions::new()).unwrap();
//! let publisher = DirectoryPublisher::new("previews").with_base_url("https://cdn.example.com");
//! let key = DestinationKey::new("core", "plank", "gif").unwrap();
//! let published = pipeline
//!     .transcode_and_publish(&FfmpegLoader::new(), "plank.mp4", &publisher, &key)
//!     .unwrap();
//! assert_eq!(published.url, "https://cdn.example.com/core/plank.gif");
//! ```
//!
//! ### Inspect the Sampling Plan
//!
//! ```
//! let plan = loopclip::planner::plan(10.0, None).unwrap();
//! assert_eq!(plan.len(), 10);
//! assert!(plan.timestamps().windows(2).all(|pair| pair[0] < pair[1]));
//! ```
//!
//! ## Features
//!
//! - **Duration-aware sampling**: roughly one frame per second, between 8
//!   and 30 frames, skipping fade-in and fade-out edges
//! - **Duplicate filtering**: cheap centre-region fingerprints reject static
//!   frames
//! - **Single adaptive retry**: fixed-interval resampling for static clips
//! - **Bounded waits**: every seek and the encode session carry a timeout
//! - **Parallel encoding**: palette quantization on a dedicated worker pool
//! - **Publishing**: pluggable blob stores with a bounded LRU URL cache
//! - **Progress & cancellation**: callbacks and `CancellationToken`
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `PreviewFuture` for running a transcode from Tokio |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod cache;
pub mod configuration;
mod conversion;
pub mod encoder;
pub mod error;
pub mod extractor;
pub mod fingerprint;
pub mod frame;
pub mod media;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod publish;
pub mod retry;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;

pub use cache::PreviewCache;
pub use configuration::PreviewOptions;
pub use encoder::{EncodeJob, EncodedPreview, EncoderConfig, EncoderPool, encode_frames};
pub use error::PreviewError;
pub use fingerprint::{DuplicateFilter, FrameFingerprint};
pub use frame::FrameBuffer;
pub use media::{MediaInfo, MediaSource, ResourceLoader};
pub use pipeline::{PreviewPipeline, PublishedPreview};
pub use planner::{SamplePlan, SamplingStrategy};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use publish::{DestinationKey, DirectoryPublisher, PublishError, Publisher};
pub use retry::{ExtractionResult, RetryController, RetryState};
pub use source::{FfmpegLoader, FfmpegLogLevel, FfmpegSource, set_ffmpeg_log_level};
#[cfg(feature = "async")]
pub use stream::PreviewFuture;

/// Produce a preview of `locator` with the FFmpeg loader and a one-off
/// pipeline.
///
/// # Errors
///
/// Any [`PreviewError`] from [`PreviewPipeline::new`] or
/// [`PreviewPipeline::transcode`].
pub fn transcode(locator: &str, options: &PreviewOptions) -> Result<EncodedPreview, PreviewError> {
    PreviewPipeline::new(options.clone())?.transcode(&FfmpegLoader::new(), locator)
}
