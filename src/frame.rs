//! Captured frames.

use image::RgbaImage;

use crate::fingerprint::FrameFingerprint;

/// A fixed-size RGBA image captured at a source timestamp.
///
/// Frame buffers live only as long as the run that produced them: each one is
/// fingerprinted, then either dropped as a duplicate or moved into the
/// encoder.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    image: RgbaImage,
    timestamp: f64,
}

impl FrameBuffer {
    /// Wrap a captured image.
    pub fn new(image: RgbaImage, timestamp: f64) -> Self {
        Self { image, timestamp }
    }

    /// The captured pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Source timestamp (seconds) the frame was captured at.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Compute the coarse duplicate-detection key for this frame.
    pub fn fingerprint(&self) -> FrameFingerprint {
        FrameFingerprint::of(&self.image)
    }

    /// Take the pixel data, consuming the frame.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}
