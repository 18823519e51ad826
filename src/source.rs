//! FFmpeg-backed media handle.
//!
//! [`FfmpegLoader`] opens a file path or network URL (optionally through a
//! relay) and returns an [`FfmpegSource`], the production
//! [`MediaSource`]. Every blocking FFmpeg call is bounded: the demuxer is
//! opened with an interrupt callback that fires once the current deadline
//! passes, and the decode-forward loop of [`seek_to`](MediaSource::seek_to)
//! checks the same deadline between packets.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use loopclip::{FfmpegLoader, MediaSource, PreviewError, ResourceLoader};
//!
//! let loader = FfmpegLoader::new();
//! let mut source = loader.open("plank.mp4", Duration::from_secs(10))?;
//! println!("{:.1}s", source.info().duration);
//!
//! source.seek_to(1.0, Duration::from_secs(2))?;
//! let frame = source.capture(320, 320)?;
//! frame.save("plank_1s.png").ok();
//! # Ok::<(), PreviewError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::RgbaImage;

use crate::conversion::{
    NO_PTS, frame_to_buffer, pts_to_seconds, rate_to_fps, seconds_to_seek_timestamp,
};
use crate::error::PreviewError;
use crate::media::{MediaInfo, MediaSource, ResourceLoader};

/// FFmpeg's own console verbosity.
///
/// This controls what FFmpeg prints to stderr. It does not affect the
/// diagnostics this crate emits through the `log` facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Recoverable errors and worse.
    Error,
    /// Warnings and worse (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
}

/// Set FFmpeg's console verbosity.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    let level = match level {
        FfmpegLogLevel::Quiet => Level::Quiet,
        FfmpegLogLevel::Error => Level::Error,
        FfmpegLogLevel::Warning => Level::Warning,
        FfmpegLogLevel::Info => Level::Info,
        FfmpegLogLevel::Debug => Level::Debug,
    };
    ffmpeg_next::util::log::set_level(level);
}

/// Shared deadline observed by the demuxer interrupt callback.
type Deadline = Arc<Mutex<Option<Instant>>>;

fn deadline_passed(deadline: &Deadline) -> bool {
    deadline
        .lock()
        .map(|guard| guard.is_some_and(|at| Instant::now() >= at))
        .unwrap_or(false)
}

fn set_deadline(deadline: &Deadline, at: Option<Instant>) {
    if let Ok(mut guard) = deadline.lock() {
        *guard = at;
    }
}

/// Opens video resources with FFmpeg.
///
/// Network locators (anything with a `scheme://` other than `file://`) can be
/// routed through a relay, e.g. a CORS proxy in front of a storage bucket.
#[derive(Debug, Clone, Default)]
pub struct FfmpegLoader {
    relay: Option<String>,
}

impl FfmpegLoader {
    /// Create a loader that opens locators directly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route network locators through a relay.
    ///
    /// A `{url}` placeholder in `template` is replaced with the locator;
    /// without one, the locator is appended.
    #[must_use]
    pub fn with_relay(mut self, template: impl Into<String>) -> Self {
        self.relay = Some(template.into());
        self
    }

    /// The locator FFmpeg will actually open for `locator`.
    pub fn resolve(&self, locator: &str) -> String {
        let is_network = locator.contains("://") && !locator.starts_with("file://");
        match &self.relay {
            Some(template) if is_network => {
                if template.contains("{url}") {
                    template.replace("{url}", locator)
                } else {
                    format!("{template}{locator}")
                }
            }
            _ => locator.to_string(),
        }
    }
}

impl ResourceLoader for FfmpegLoader {
    type Source = FfmpegSource;

    fn open(&self, locator: &str, timeout: Duration) -> Result<FfmpegSource, PreviewError> {
        FfmpegSource::open(&self.resolve(locator), timeout).map_err(|error| match error {
            PreviewError::VideoLoad { reason, .. } => PreviewError::VideoLoad {
                locator: locator.to_string(),
                reason,
            },
            other => other,
        })
    }
}

/// A video stream opened with FFmpeg.
///
/// Holds the demuxer, one decoder for the best video stream, and the most
/// recently settled picture. Dropping it closes all three.
pub struct FfmpegSource {
    input: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    time_base: Rational,
    /// Stream start time in seconds; packet timestamps are offset by this.
    origin: f64,
    frames_per_second: f64,
    info: MediaInfo,
    deadline: Deadline,
    /// Picture at the current decode position, once a seek has settled.
    current: Option<VideoFrame>,
    scaler: Option<(ScalingContext, u32, u32)>,
    locator: String,
}

impl Debug for FfmpegSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegSource")
            .field("locator", &self.locator)
            .field("info", &self.info)
            .field("stream_index", &self.stream_index)
            .field("frames_per_second", &self.frames_per_second)
            .field("ready", &self.current.is_some())
            .finish_non_exhaustive()
    }
}

impl FfmpegSource {
    /// Open `locator` and read its video metadata.
    ///
    /// Only the container header and codec parameters are read; no frame is
    /// decoded until the first seek.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::VideoLoad`] if FFmpeg cannot open the resource
    /// within `timeout`, the resource has no video stream, or its duration is
    /// unknown.
    pub fn open(locator: &str, timeout: Duration) -> Result<Self, PreviewError> {
        let load_error = |reason: String| PreviewError::VideoLoad {
            locator: locator.to_string(),
            reason,
        };

        log::debug!("Opening video resource: {locator}");

        ffmpeg_next::init()
            .map_err(|error| load_error(format!("FFmpeg initialisation failed: {error}")))?;

        let deadline: Deadline = Arc::new(Mutex::new(Some(Instant::now() + timeout)));
        let interrupt_deadline = Arc::clone(&deadline);
        let input = ffmpeg_next::format::input_with_interrupt(locator, move || {
            deadline_passed(&interrupt_deadline)
        })
        .map_err(|error| {
            if deadline_passed(&deadline) {
                load_error(format!("timed out after {timeout:?}"))
            } else {
                load_error(error.to_string())
            }
        })?;
        set_deadline(&deadline, None);

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| load_error("no video stream found".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| load_error(format!("failed to create video decoder: {error}")))?;

        let frames_per_second = {
            let average = rate_to_fps(stream.avg_frame_rate());
            if average > 0.0 {
                average
            } else {
                rate_to_fps(stream.rate())
            }
        };

        let origin = if stream.start_time() != NO_PTS {
            pts_to_seconds(stream.start_time(), time_base)
        } else {
            0.0
        };

        let container_duration = input.duration();
        let duration = if container_duration > 0 {
            container_duration as f64 / 1_000_000.0
        } else if stream.duration() > 0 {
            pts_to_seconds(stream.duration(), time_base)
        } else {
            0.0
        };
        if !(duration.is_finite() && duration > 0.0) {
            return Err(load_error("duration is unknown".to_string()));
        }

        let info = MediaInfo {
            duration,
            width: decoder.width(),
            height: decoder.height(),
        };
        if info.width == 0 || info.height == 0 {
            return Err(load_error("video stream reports zero dimensions".to_string()));
        }

        log::info!(
            "Opened video resource: {locator} ({}x{}, {:.2}s, {:.2} fps)",
            info.width,
            info.height,
            info.duration,
            frames_per_second,
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            origin,
            frames_per_second,
            info,
            deadline,
            current: None,
            scaler: None,
            locator: locator.to_string(),
        })
    }

    /// Decode forward from the current demuxer position until a picture at or
    /// after `target` (stream seconds) arrives or the stream ends.
    fn decode_until(
        &mut self,
        target: f64,
        timestamp: f64,
        timeout: Duration,
    ) -> Result<(), PreviewError> {
        let tolerance = if self.frames_per_second > 0.0 {
            0.5 / self.frames_per_second
        } else {
            0.0
        };
        let timed_out = || PreviewError::SeekTimeout { timestamp, timeout };

        let mut scratch = VideoFrame::empty();
        let mut eof_sent = false;

        loop {
            if deadline_passed(&self.deadline) {
                return Err(timed_out());
            }

            while self.decoder.receive_frame(&mut scratch).is_ok() {
                let pts = scratch.timestamp().or(scratch.pts()).unwrap_or(0);
                let seconds = pts_to_seconds(pts, self.time_base);
                let decoded = std::mem::replace(&mut scratch, VideoFrame::empty());
                self.current = Some(decoded);
                if seconds + tolerance >= target {
                    return Ok(());
                }
            }

            if eof_sent {
                // Past the last picture: the final decoded frame is the settled one.
                return if self.current.is_some() {
                    Ok(())
                } else {
                    Err(PreviewError::VideoDecode(format!(
                        "no picture decodable at or after {timestamp:.3}s"
                    )))
                };
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet).map_err(|error| {
                            PreviewError::VideoDecode(format!(
                                "decoder rejected packet near {timestamp:.3}s: {error}"
                            ))
                        })?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    eof_sent = true;
                }
                Err(_) if deadline_passed(&self.deadline) => return Err(timed_out()),
                Err(error) => {
                    log::debug!("Skipping unreadable packet near {timestamp:.3}s: {error}");
                }
            }
        }
    }
}

impl MediaSource for FfmpegSource {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn seek_to(&mut self, timestamp: f64, timeout: Duration) -> Result<(), PreviewError> {
        let target = self.origin + timestamp;
        set_deadline(&self.deadline, Some(Instant::now() + timeout));
        self.current = None;

        let seek_position = seconds_to_seek_timestamp(target);
        let result = self
            .input
            .seek(seek_position, ..seek_position)
            .map_err(|error| {
                if deadline_passed(&self.deadline) {
                    PreviewError::SeekTimeout { timestamp, timeout }
                } else {
                    PreviewError::VideoDecode(format!("seek to {timestamp:.3}s failed: {error}"))
                }
            })
            .and_then(|()| {
                self.decoder.flush();
                self.decode_until(target, timestamp, timeout)
            });

        set_deadline(&self.deadline, None);
        result
    }

    fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    fn capture(&mut self, width: u32, height: u32) -> Result<RgbaImage, PreviewError> {
        let frame = self.current.as_ref().ok_or_else(|| {
            PreviewError::VideoDecode("capture requested before any seek settled".to_string())
        })?;

        let stale = !matches!(&self.scaler, Some((_, w, h)) if *w == width && *h == height);
        if stale {
            let scaler = ScalingContext::get(
                frame.format(),
                frame.width(),
                frame.height(),
                Pixel::RGBA,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.scaler = Some((scaler, width, height));
        }

        let mut rgba_frame = VideoFrame::empty();
        if let Some((scaler, _, _)) = self.scaler.as_mut() {
            scaler.run(frame, &mut rgba_frame)?;
        }

        let buffer = frame_to_buffer(&rgba_frame, width, height, 4);
        RgbaImage::from_raw(width, height, buffer).ok_or_else(|| {
            PreviewError::VideoDecode(
                "Failed to construct RGBA image from decoded frame data".to_string(),
            )
        })
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        log::debug!("Releasing video resource: {}", self.locator);
    }
}
