//! Async front end for the preview pipeline.
//!
//! [`PreviewFuture`] runs a whole transcode on a Tokio blocking thread so the
//! FFmpeg seeks and the encoder wait never tie up the async runtime's worker
//! threads. Must be created from within a Tokio runtime.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use loopclip::{FfmpegLoader, PreviewError, PreviewOptions, PreviewPipeline};
//!
//! # async fn example() -> Result<(), PreviewError> {
//! let pipeline = Arc::new(PreviewPipeline::new(PreviewOptions::new())?);
//! let preview = pipeline
//!     .transcode_async(FfmpegLoader::new(), "deadlift.mp4")
//!     .await?;
//! println!("{} frames, {} bytes", preview.frame_count, preview.payload.len());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::encoder::EncodedPreview;
use crate::error::PreviewError;
use crate::media::ResourceLoader;
use crate::pipeline::PreviewPipeline;

/// A future that resolves to the finished preview.
///
/// If the blocking task panics or is aborted the future resolves to
/// [`PreviewError::Cancelled`].
pub struct PreviewFuture {
    handle: JoinHandle<Result<EncodedPreview, PreviewError>>,
}

impl PreviewFuture {
    /// Abort the task if it has not started yet. A transcode already running
    /// keeps going until its next checkpoint; use a
    /// [`CancellationToken`](crate::CancellationToken) to stop it.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Future for PreviewFuture {
    type Output = Result<EncodedPreview, PreviewError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(PreviewError::Cancelled)))
    }
}

impl PreviewPipeline {
    /// Transcode `locator` on a blocking thread.
    pub fn transcode_async<L>(self: &Arc<Self>, loader: L, locator: impl Into<String>) -> PreviewFuture
    where
        L: ResourceLoader + Send + 'static,
    {
        let pipeline = Arc::clone(self);
        let locator = locator.into();
        let handle =
            tokio::task::spawn_blocking(move || pipeline.transcode(&loader, &locator));
        PreviewFuture { handle }
    }
}
