//! FFmpeg media handle tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::path::Path;
use std::time::Duration;

use loopclip::{
    FfmpegLoader, FfmpegLogLevel, MediaSource, PreviewError, PreviewOptions, PreviewPipeline,
    ResourceLoader, set_ffmpeg_log_level,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

const TIMEOUT: Duration = Duration::from_secs(10);

// ── Relay resolution ───────────────────────────────────────────────

#[test]
fn relay_template_wraps_network_locators() {
    let loader = FfmpegLoader::new().with_relay("https://relay.example.com/?url={url}");
    assert_eq!(
        loader.resolve("https://bucket.example.com/squat.mp4"),
        "https://relay.example.com/?url=https://bucket.example.com/squat.mp4"
    );
}

#[test]
fn relay_prefix_is_prepended() {
    let loader = FfmpegLoader::new().with_relay("https://relay.example.com/");
    assert_eq!(
        loader.resolve("http://host/clip.mp4"),
        "https://relay.example.com/http://host/clip.mp4"
    );
}

#[test]
fn local_paths_bypass_the_relay() {
    let loader = FfmpegLoader::new().with_relay("https://relay.example.com/?url={url}");
    assert_eq!(loader.resolve("clips/squat.mp4"), "clips/squat.mp4");
    assert_eq!(loader.resolve("file:///tmp/a.mp4"), "file:///tmp/a.mp4");
    assert_eq!(FfmpegLoader::new().resolve("https://x/y.mp4"), "https://x/y.mp4");
}

// ── Opening ────────────────────────────────────────────────────────

#[test]
fn missing_file_is_a_load_error() {
    set_ffmpeg_log_level(FfmpegLogLevel::Quiet);
    let result = FfmpegLoader::new().open("tests/fixtures/does_not_exist.mp4", TIMEOUT);
    match result {
        Err(PreviewError::VideoLoad { locator, .. }) => {
            assert_eq!(locator, "tests/fixtures/does_not_exist.mp4");
        }
        Err(other) => panic!("Expected VideoLoad, got: {other}"),
        Ok(_) => panic!("Expected VideoLoad, got a source"),
    }
}

#[test]
fn open_reads_metadata_only() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = FfmpegLoader::new().open(path, TIMEOUT).expect("open");
    let info = source.info();
    assert!(info.duration > 0.0);
    assert!(info.width > 0 && info.height > 0);
    assert!(!source.is_ready());
}

#[test]
fn capture_before_seek_is_an_error() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = FfmpegLoader::new().open(path, TIMEOUT).expect("open");
    assert!(matches!(
        source.capture(32, 32),
        Err(PreviewError::VideoDecode(_))
    ));
}

// ── Seeking and capture ────────────────────────────────────────────

#[test]
fn seek_then_capture_scales_to_the_requested_size() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = FfmpegLoader::new().open(path, TIMEOUT).expect("open");
    let midpoint = source.info().duration / 2.0;
    source.seek_to(midpoint, TIMEOUT).expect("seek");
    assert!(source.is_ready());

    let image = source.capture(64, 48).expect("capture");
    assert_eq!(image.dimensions(), (64, 48));
}

#[test]
fn seeks_may_go_backwards() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = FfmpegLoader::new().open(path, TIMEOUT).expect("open");
    let duration = source.info().duration;
    source.seek_to(duration * 0.8, TIMEOUT).expect("late seek");
    source.seek_to(duration * 0.1, TIMEOUT).expect("early seek");
    assert_eq!(source.capture(16, 16).expect("capture").dimensions(), (16, 16));
}

#[test]
fn seek_near_the_end_settles_on_the_last_frame() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = FfmpegLoader::new().open(path, TIMEOUT).expect("open");
    let duration = source.info().duration;
    source.seek_to(duration - 0.001, TIMEOUT).expect("seek");
    assert!(source.capture(16, 16).is_ok());
}

// ── Pipeline ───────────────────────────────────────────────────────

#[test]
fn fixture_transcodes_end_to_end() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = PreviewOptions::new()
        .with_size(96, 96)
        .with_minimum_unique_frames(1);
    let preview = PreviewPipeline::new(options)
        .unwrap()
        .transcode(&FfmpegLoader::new(), path)
        .expect("transcode");

    assert!(preview.frame_count >= 1);
    assert_eq!((preview.width, preview.height), (96, 96));
    assert_eq!(&preview.payload[..6], b"GIF89a");
}

#[test]
fn convenience_function_uses_ffmpeg() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = PreviewOptions::new()
        .with_size(48, 48)
        .with_frame_count(4)
        .with_minimum_unique_frames(1);
    let preview = loopclip::transcode(path, &options).expect("transcode");
    assert!(preview.frame_count <= 4);
}
