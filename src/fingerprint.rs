//! Duplicate-frame detection.
//!
//! A [`FrameFingerprint`] is a cheap digest of the centre of a frame: only the
//! middle 40–60 % band of rows and columns is read, and only every 5th pixel
//! of that band (every 20th byte) contributes, all four channels of it. Static shots (an athlete holding a position, a
//! paused clip) produce identical fingerprints and are dropped by the
//! [`DuplicateFilter`]; near-identical frames that differ at the sampled bytes
//! slip through, which is acceptable for a preview.

use std::collections::HashSet;

use image::RgbaImage;

use crate::frame::FrameBuffer;

/// Every Nth pixel of the central window contributes to the fingerprint.
pub const SAMPLE_STRIDE: usize = 5;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Coarse, deterministic key for a frame's central region.
///
/// Two frames with the same bytes at the sampled positions always produce the
/// same fingerprint. This is a heuristic, not a cryptographic digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameFingerprint(u64);

impl FrameFingerprint {
    /// Fingerprint an RGBA image.
    pub fn of(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let (left, right) = central_band(width as usize);
        let (top, bottom) = central_band(height as usize);

        let row_bytes = width as usize * 4;
        let raw = image.as_raw();

        let mut hash = FNV_OFFSET_BASIS;
        hash = fnv_mix(hash, &width.to_le_bytes());
        hash = fnv_mix(hash, &height.to_le_bytes());

        // The stride runs continuously across rows of the window.
        let mut offset = 0usize;
        for row in top..bottom {
            let band = &raw[row * row_bytes + left * 4..row * row_bytes + right * 4];
            let first = (SAMPLE_STRIDE - offset % SAMPLE_STRIDE) % SAMPLE_STRIDE;
            for pixel in band.chunks_exact(4).skip(first).step_by(SAMPLE_STRIDE) {
                hash = fnv_mix(hash, pixel);
            }
            offset += right - left;
        }

        Self(hash)
    }

    /// The raw digest value.
    pub fn value(self) -> u64 {
        self.0
    }
}

/// The `[40 %, 60 %)` band of an axis, widened to at least one pixel.
fn central_band(extent: usize) -> (usize, usize) {
    if extent == 0 {
        return (0, 0);
    }
    let start = (extent * 2 / 5).min(extent - 1);
    let end = (extent * 3 / 5).max(start + 1).min(extent);
    (start, end)
}

fn fnv_mix(mut hash: u64, bytes: &[u8]) -> u64 {
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Stateful filter that admits each distinct fingerprint once per pass.
#[derive(Debug, Default)]
pub struct DuplicateFilter {
    seen: HashSet<FrameFingerprint>,
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `frame` if its fingerprint has not been seen in this pass.
    ///
    /// Accepting records the fingerprint, so a later frame with the same
    /// fingerprint is rejected.
    pub fn accept(&mut self, frame: &FrameBuffer) -> bool {
        self.seen.insert(frame.fingerprint())
    }

    /// Returns `true` if a frame with this fingerprint was already accepted.
    pub fn contains(&self, fingerprint: &FrameFingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Forget every fingerprint. Called between passes.
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    /// Number of distinct fingerprints accepted in this pass.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
