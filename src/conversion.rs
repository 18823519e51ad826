//! Internal conversion helpers for the FFmpeg source.
//!
//! Pixel-plane copying and timestamp rescaling shared by
//! [`FfmpegSource`](crate::FfmpegSource).

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// FFmpeg's "no presentation timestamp" sentinel (`AV_NOPTS_VALUE`).
pub(crate) const NO_PTS: i64 = i64::MIN;

/// Copy the first plane of a packed video frame into a tightly-packed buffer.
///
/// FFmpeg frames usually carry per-row padding (stride > width × bpp); the
/// result has none, so it can be handed to [`image::RgbaImage::from_raw`].
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let data = video_frame.data(0);
    pack_rows(data, stride, width as usize * bytes_per_pixel, height as usize)
}

/// Strip row padding from a strided plane.
pub(crate) fn pack_rows(data: &[u8], stride: usize, row_bytes: usize, rows: usize) -> Vec<u8> {
    if stride == row_bytes {
        return data[..row_bytes * rows].to_vec();
    }
    let mut buffer = Vec::with_capacity(row_bytes * rows);
    for row in 0..rows {
        let row_start = row * stride;
        buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    buffer
}

/// Rescale a PTS value from a stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert seconds to a container seek timestamp in `AV_TIME_BASE`
/// (microseconds), as expected by `avformat_seek_file` with stream index -1.
pub(crate) fn seconds_to_seek_timestamp(seconds: f64) -> i64 {
    (seconds.max(0.0) * 1_000_000.0) as i64
}

/// Frames per second from a stream rate, `0.0` when unknown.
pub(crate) fn rate_to_fps(rate: Rational) -> f64 {
    if rate.denominator() == 0 || rate.numerator() <= 0 {
        0.0
    } else {
        rate.numerator() as f64 / rate.denominator() as f64
    }
}
