//! End-to-end preview pipeline.
//!
//! [`PreviewPipeline`] wires the stages together: open the media handle,
//! plan samples, extract and filter (retrying once if the clip is too
//! static), release the handle, then encode on the worker pool and optionally
//! publish.
//!
//! The media handle is owned by the invocation and dropped on every exit
//! path. Extraction always finishes (retry included) before encoding starts;
//! the two stages never overlap.
//!
//! # Example
//!
//! ```no_run
//! use loopclip::{
//!     DestinationKey, DirectoryPublisher, FfmpegLoader, PreviewError, PreviewOptions,
//!     PreviewPipeline,
//! };
//!
//! let pipeline = PreviewPipeline::new(PreviewOptions::new().with_size(240, 240))?;
//! let loader = FfmpegLoader::new();
//!
//! let preview = pipeline.transcode(&loader, "lunge.mp4")?;
//! std::fs::write("lunge.gif", &preview.payload)?;
//!
//! let publisher = DirectoryPublisher::new("previews");
//! let key = DestinationKey::new("legs", "lunge", "gif")?;
//! let published = pipeline.transcode_and_publish(&loader, "lunge.mp4", &publisher, &key)?;
//! println!("{}", published.url);
//! # Ok::<(), PreviewError>(())
//! ```

use std::sync::Arc;

use crate::cache::PreviewCache;
use crate::configuration::PreviewOptions;
use crate::encoder::{EncodedPreview, EncoderPool};
use crate::error::PreviewError;
use crate::media::{MediaSource, ResourceLoader};
use crate::planner::plan;
use crate::progress::{OperationType, ProgressTracker};
use crate::publish::{DestinationKey, Publisher};
use crate::retry::run_with_retry;

/// Outcome of [`PreviewPipeline::transcode_and_publish`].
#[derive(Debug, Clone)]
pub struct PublishedPreview {
    /// Retrieval URL returned by the publisher (or the cache).
    pub url: String,
    /// Where the preview was published.
    pub key: DestinationKey,
    /// The encoded preview; `None` when the URL came from the cache.
    pub preview: Option<EncodedPreview>,
}

impl PublishedPreview {
    /// Returns `true` if transcoding was skipped because of a cache hit.
    pub fn is_cached(&self) -> bool {
        self.preview.is_none()
    }
}

/// Runs preview transcodes with a fixed configuration and encoder pool.
///
/// A pipeline can be reused for many invocations; each invocation owns its
/// own media handle.
#[derive(Debug)]
pub struct PreviewPipeline {
    options: PreviewOptions,
    encoder: EncoderPool,
    cache: Option<Arc<PreviewCache>>,
}

impl PreviewPipeline {
    /// Validate `options` and start the encoder pool.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidConfiguration`] if the options are out of
    /// range, or [`PreviewError::Encoding`] if the pool cannot start.
    pub fn new(options: PreviewOptions) -> Result<Self, PreviewError> {
        options.validate()?;
        let encoder = EncoderPool::new(options.encoder_workers)?;
        Ok(Self {
            options,
            encoder,
            cache: None,
        })
    }

    /// Consult and fill `cache` in [`transcode_and_publish`](Self::transcode_and_publish).
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<PreviewCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &PreviewOptions {
        &self.options
    }

    pub fn cache(&self) -> Option<&Arc<PreviewCache>> {
        self.cache.as_ref()
    }

    /// Open `locator` with `loader` and produce a preview.
    ///
    /// # Errors
    ///
    /// [`PreviewError::VideoLoad`] if the resource cannot be opened (nothing
    /// is extracted or encoded), otherwise any error from
    /// [`transcode_source`](Self::transcode_source).
    pub fn transcode<L: ResourceLoader + ?Sized>(
        &self,
        loader: &L,
        locator: &str,
    ) -> Result<EncodedPreview, PreviewError> {
        if self.options.is_cancelled() {
            return Err(PreviewError::Cancelled);
        }
        let source = loader.open(locator, self.options.open_timeout)?;
        self.transcode_source(source)
    }

    /// Produce a preview from an already opened media handle.
    ///
    /// The handle is consumed and released once extraction finishes, whether
    /// it succeeded or not.
    ///
    /// # Errors
    ///
    /// - [`PreviewError::InvalidDuration`] if the handle reports an unusable
    ///   duration.
    /// - [`PreviewError::SeekTimeout`] or [`PreviewError::VideoDecode`] from
    ///   extraction.
    /// - [`PreviewError::InsufficientFrames`] if the clip is too static even
    ///   after the retry pass.
    /// - [`PreviewError::Cancelled`] if the token fires before a seek or
    ///   before encoding.
    /// - [`PreviewError::Encoding`] if the encode session fails or times out.
    pub fn transcode_source<S: MediaSource>(
        &self,
        mut source: S,
    ) -> Result<EncodedPreview, PreviewError> {
        let extraction = {
            let info = source.info().clone();
            log::debug!(
                "Transcoding {:.2}s source ({}x{}) to {}x{} preview",
                info.duration,
                info.width,
                info.height,
                self.options.width,
                self.options.height,
            );
            let plan = plan(info.duration, self.options.frame_count)?;
            run_with_retry(&mut source, &plan, &self.options)
        };
        drop(source);
        let extraction = extraction?;

        if self.options.is_cancelled() {
            return Err(PreviewError::Cancelled);
        }

        let frames = extraction.into_frames();
        let frame_count = frames.len();
        let preview = self
            .encoder
            .submit_with_progress(
                frames,
                self.options.encoder_config(),
                self.options.progress.clone(),
            )
            .wait(self.options.encode_timeout)?;

        if preview.frame_count != frame_count {
            return Err(PreviewError::Encoding(format!(
                "encoder reported {} frames for {frame_count} submitted",
                preview.frame_count
            )));
        }
        Ok(preview)
    }

    /// Transcode `locator` and publish the payload under `key`.
    ///
    /// With a cache attached, a key that was already published returns its
    /// cached URL without opening the resource.
    ///
    /// # Errors
    ///
    /// Any error from [`transcode`](Self::transcode), or
    /// [`PreviewError::Publish`] wrapping the publisher's error unmodified.
    pub fn transcode_and_publish<L, P>(
        &self,
        loader: &L,
        locator: &str,
        publisher: &P,
        key: &DestinationKey,
    ) -> Result<PublishedPreview, PreviewError>
    where
        L: ResourceLoader + ?Sized,
        P: Publisher + ?Sized,
    {
        if let Some(url) = self.cache.as_ref().and_then(|cache| cache.get(key)) {
            log::debug!("Preview {key} served from cache");
            return Ok(PublishedPreview {
                url,
                key: key.clone(),
                preview: None,
            });
        }

        let preview = self.transcode(loader, locator)?;

        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::Publishing,
            Some(1),
            1,
        );
        let url = publisher.publish(&preview.payload, key)?;
        tracker.advance(None);

        if let Some(cache) = &self.cache {
            cache.insert(key.clone(), url.clone());
        }

        Ok(PublishedPreview {
            url,
            key: key.clone(),
            preview: Some(preview),
        })
    }
}
