//! Animated GIF encoding on a worker pool.
//!
//! Encoding is the only parallel stage of a run. An [`EncoderPool`] owns a
//! small [`rayon`] thread pool; [`EncoderPool::submit`] hands it the frozen
//! frame list and returns an [`EncodeJob`] whose [`wait`](EncodeJob::wait)
//! receives the finished payload (or error) over a channel, bounded by a
//! timeout. The extraction loop never sees the pool.
//!
//! Inside a job, palette quantization of each frame runs in parallel (it is
//! independent per frame and dominates the cost); the quantized frames are
//! then written in capture order by a single GIF encoder session.
//!
//! A job whose [`EncodeJob`] timed out or was dropped is abandoned: it stops
//! at its next checkpoint (before it starts, after each quantized frame, and
//! before each write) so the worker goes back to the pool. A worker blocked
//! inside a single frame's quantization finishes that frame first.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use image::{Rgba, RgbaImage};
//! use loopclip::{EncoderConfig, EncoderPool, FrameBuffer, PreviewError};
//!
//! let frames: Vec<FrameBuffer> = (0..4u8)
//!     .map(|i| FrameBuffer::new(RgbaImage::from_pixel(16, 16, Rgba([i * 60, 0, 0, 255])), i as f64))
//!     .collect();
//!
//! let pool = EncoderPool::new(2)?;
//! let preview = pool
//!     .submit(frames, EncoderConfig::new(16, 16))
//!     .wait(Duration::from_secs(30))?;
//! assert_eq!(preview.frame_count, 4);
//! # Ok::<(), PreviewError>(())
//! ```

use std::{
    sync::{Arc, mpsc},
    time::Duration,
};

use gif::{Encoder, Frame, Repeat};
use rayon::{
    ThreadPool, ThreadPoolBuilder,
    iter::{IntoParallelIterator, ParallelIterator},
};

use crate::configuration::{DEFAULT_FRAME_DELAY_MS, DEFAULT_PALETTE_QUALITY};
use crate::error::PreviewError;
use crate::frame::FrameBuffer;
use crate::progress::{
    CancellationToken, NoOpProgress, OperationType, ProgressCallback, ProgressTracker,
};

/// Settings for one encode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Frame width; every frame must match.
    pub width: u32,
    /// Frame height; every frame must match.
    pub height: u32,
    /// Delay between frames in milliseconds, rounded to GIF's 10 ms units.
    pub frame_delay_ms: u32,
    /// Quantizer speed/quality index, 1 (best) to 30 (fastest).
    pub palette_quality: i32,
    /// Repeat count. `0` loops forever.
    pub loop_count: u16,
}

impl EncoderConfig {
    /// Default delay, palette quality and infinite looping at the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            palette_quality: DEFAULT_PALETTE_QUALITY,
            loop_count: 0,
        }
    }

    /// Frame delay in GIF centiseconds.
    pub fn delay_centiseconds(&self) -> u16 {
        ((self.frame_delay_ms + 5) / 10).min(u16::MAX as u32) as u16
    }

    fn repeat(&self) -> Repeat {
        match self.loop_count {
            0 => Repeat::Infinite,
            n => Repeat::Finite(n),
        }
    }
}

/// A finished animated preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPreview {
    /// The GIF file bytes.
    pub payload: Vec<u8>,
    /// Frames actually encoded.
    pub frame_count: usize,
    /// Pixel width of the animation.
    pub width: u32,
    /// Pixel height of the animation.
    pub height: u32,
}

impl EncodedPreview {
    /// File extension for the payload format.
    pub const EXTENSION: &'static str = "gif";
}

/// Encode `frames` in the calling thread's rayon context.
///
/// # Errors
///
/// Returns [`PreviewError::Encoding`] if `frames` is empty, a frame does not
/// match the configured size, or the GIF writer fails.
pub fn encode_frames(
    frames: Vec<FrameBuffer>,
    config: &EncoderConfig,
) -> Result<EncodedPreview, PreviewError> {
    encode_with_progress(frames, config, Arc::new(NoOpProgress), &CancellationToken::new())
}

fn encode_with_progress(
    frames: Vec<FrameBuffer>,
    config: &EncoderConfig,
    progress: Arc<dyn ProgressCallback>,
    abandoned: &CancellationToken,
) -> Result<EncodedPreview, PreviewError> {
    if abandoned.is_cancelled() {
        return Err(PreviewError::Cancelled);
    }
    if frames.is_empty() {
        return Err(PreviewError::Encoding("no frames to encode".to_string()));
    }
    if config.width > u16::MAX as u32 || config.height > u16::MAX as u32 {
        return Err(PreviewError::Encoding(format!(
            "{}x{} exceeds the GIF size limit",
            config.width, config.height
        )));
    }
    if !(1..=30).contains(&config.palette_quality) {
        return Err(PreviewError::Encoding(format!(
            "palette quality {} is outside 1..=30",
            config.palette_quality
        )));
    }

    let width = config.width as u16;
    let height = config.height as u16;
    let frame_count = frames.len();
    let expected_len = config.width as usize * config.height as usize * 4;

    log::debug!(
        "Encoding {frame_count} frames to GIF ({}x{}, delay={}cs, quality={})",
        config.width,
        config.height,
        config.delay_centiseconds(),
        config.palette_quality,
    );

    // Quantize in parallel; `collect` keeps capture order.
    let quantized: Result<Vec<Frame<'static>>, PreviewError> = frames
        .into_par_iter()
        .map(|frame| {
            if abandoned.is_cancelled() {
                return Err(PreviewError::Cancelled);
            }
            let timestamp = frame.timestamp();
            let mut pixels = frame.into_image().into_raw();
            if pixels.len() != expected_len {
                return Err(PreviewError::Encoding(format!(
                    "frame at {timestamp:.3}s is {} bytes, expected {expected_len}",
                    pixels.len()
                )));
            }
            let mut gif_frame =
                Frame::from_rgba_speed(width, height, &mut pixels, config.palette_quality);
            gif_frame.delay = config.delay_centiseconds();
            Ok(gif_frame)
        })
        .collect();
    let quantized = quantized?;

    let mut tracker = ProgressTracker::new(
        progress,
        OperationType::Encoding,
        Some(frame_count as u64),
        1,
    );

    let mut encoder = Encoder::new(Vec::new(), width, height, &[])
        .map_err(|e| PreviewError::Encoding(format!("Failed to create GIF encoder: {e}")))?;
    encoder
        .set_repeat(config.repeat())
        .map_err(|e| PreviewError::Encoding(format!("Failed to set GIF repeat: {e}")))?;

    for gif_frame in &quantized {
        if abandoned.is_cancelled() {
            return Err(PreviewError::Cancelled);
        }
        encoder
            .write_frame(gif_frame)
            .map_err(|e| PreviewError::Encoding(format!("Failed to write GIF frame: {e}")))?;
        tracker.advance(None);
    }

    let payload = encoder
        .into_inner()
        .map_err(|e| PreviewError::Encoding(format!("Failed to finalize GIF: {e}")))?;
    tracker.finish();

    log::info!(
        "Encoded {frame_count} frames into {} byte GIF",
        payload.len()
    );

    Ok(EncodedPreview {
        payload,
        frame_count,
        width: config.width,
        height: config.height,
    })
}

/// A fixed-size pool of encoder workers.
pub struct EncoderPool {
    pool: ThreadPool,
    workers: usize,
}

impl std::fmt::Debug for EncoderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderPool")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl EncoderPool {
    /// Start a pool with `workers` threads.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidConfiguration`] for zero workers and
    /// [`PreviewError::Encoding`] if the threads cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, PreviewError> {
        if workers == 0 {
            return Err(PreviewError::InvalidConfiguration(
                "encoder worker count must be at least 1".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("loopclip-encoder-{index}"))
            .panic_handler(|_| log::error!("Encoder worker panicked"))
            .build()
            .map_err(|e| PreviewError::Encoding(format!("Failed to start encoder pool: {e}")))?;
        Ok(Self { pool, workers })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue `frames` for encoding. The frame list is moved in and frozen.
    pub fn submit(&self, frames: Vec<FrameBuffer>, config: EncoderConfig) -> EncodeJob {
        self.submit_with_progress(frames, config, Arc::new(NoOpProgress))
    }

    pub(crate) fn submit_with_progress(
        &self,
        frames: Vec<FrameBuffer>,
        config: EncoderConfig,
        progress: Arc<dyn ProgressCallback>,
    ) -> EncodeJob {
        let (sender, receiver) = mpsc::channel();
        let frame_count = frames.len();
        let abandoned = CancellationToken::new();
        let worker_token = abandoned.clone();
        self.pool.spawn(move || {
            let result = encode_with_progress(frames, &config, progress, &worker_token);
            if worker_token.is_cancelled() {
                log::debug!("Abandoned encode session for {frame_count} frames stopped");
            }
            // The receiver is gone if the caller stopped waiting.
            let _ = sender.send(result);
        });
        EncodeJob {
            receiver,
            frame_count,
            abandoned,
        }
    }
}

/// Handle to a submitted encode session.
///
/// Dropping the handle, or letting [`wait`](EncodeJob::wait) time out,
/// abandons the session.
#[derive(Debug)]
pub struct EncodeJob {
    receiver: mpsc::Receiver<Result<EncodedPreview, PreviewError>>,
    frame_count: usize,
    abandoned: CancellationToken,
}

impl EncodeJob {
    /// Frames submitted with this job.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Block until the job finishes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, or [`PreviewError::Encoding`] if the
    /// timeout elapses or the worker died without answering.
    pub fn wait(self, timeout: Duration) -> Result<EncodedPreview, PreviewError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.abandoned.cancel();
                Err(PreviewError::Encoding(format!(
                    "encode session for {} frames did not finish within {timeout:?}",
                    self.frame_count
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(PreviewError::Encoding(
                "encoder worker exited without a result".to_string(),
            )),
        }
    }
}

impl Drop for EncodeJob {
    fn drop(&mut self) {
        self.abandoned.cancel();
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    fn frames(count: u8, size: u32) -> Vec<FrameBuffer> {
        (0..count)
            .map(|index| {
                let image = RgbaImage::from_pixel(size, size, Rgba([index * 40, 10, 20, 255]));
                FrameBuffer::new(image, index as f64)
            })
            .collect()
    }

    #[test]
    fn abandoned_session_stops_before_encoding() {
        let token = CancellationToken::new();
        token.cancel();
        let result = encode_with_progress(
            frames(3, 8),
            &EncoderConfig::new(8, 8),
            Arc::new(NoOpProgress),
            &token,
        );
        assert!(matches!(result, Err(PreviewError::Cancelled)));
    }

    #[test]
    fn timing_out_abandons_the_session() {
        let pool = EncoderPool::new(1).unwrap();
        let job = pool.submit(frames(4, 512), EncoderConfig::new(512, 512));
        let abandoned = job.abandoned.clone();

        assert!(matches!(
            job.wait(Duration::from_micros(1)),
            Err(PreviewError::Encoding(_))
        ));
        assert!(abandoned.is_cancelled());

        // The worker is free again for the next session.
        let next = pool
            .submit(frames(2, 8), EncoderConfig::new(8, 8))
            .wait(Duration::from_secs(30))
            .unwrap();
        assert_eq!(next.frame_count, 2);
    }
}
