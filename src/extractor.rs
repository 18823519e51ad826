//! Sequential frame extraction.
//!
//! The extractor visits a [`SamplePlan`] strictly in order: each seek must
//! settle before the frame is captured and before the next seek is issued,
//! because a [`MediaSource`] has a single decode position. Captured frames go
//! straight through the [`DuplicateFilter`]; only accepted frames are kept.

use crate::configuration::PreviewOptions;
use crate::error::PreviewError;
use crate::fingerprint::DuplicateFilter;
use crate::frame::FrameBuffer;
use crate::media::MediaSource;
use crate::planner::SamplePlan;
use crate::progress::{OperationType, ProgressTracker};

/// Run one extraction pass over `plan`.
///
/// Returns accepted frames in plan order. The pass stops early once `limit`
/// unique frames are held.
///
/// # Errors
///
/// - [`PreviewError::Cancelled`] if the cancellation token fires before a step.
/// - Any seek or capture error from the source. A failed seek is fatal for the
///   pass; it is never skipped.
pub fn extract<S: MediaSource + ?Sized>(
    source: &mut S,
    plan: &SamplePlan,
    filter: &mut DuplicateFilter,
    options: &PreviewOptions,
    limit: usize,
) -> Result<Vec<FrameBuffer>, PreviewError> {
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::FrameCapture,
        Some(plan.len() as u64),
        options.batch_size,
    );
    let mut accepted = Vec::with_capacity(limit.min(plan.len()));
    let mut duplicates = 0usize;

    for &timestamp in plan.timestamps() {
        if options.is_cancelled() {
            return Err(PreviewError::Cancelled);
        }
        if accepted.len() >= limit {
            break;
        }

        source.seek_to(timestamp, options.seek_timeout)?;
        if !source.is_ready() {
            return Err(PreviewError::VideoDecode(format!(
                "seek to {timestamp:.3}s returned without a decodable picture"
            )));
        }
        let image = source.capture(options.width, options.height)?;
        let frame = FrameBuffer::new(image, timestamp);

        if filter.accept(&frame) {
            accepted.push(frame);
        } else {
            duplicates += 1;
            log::debug!("Dropped duplicate frame at {timestamp:.3}s");
        }

        tracker.advance(Some(timestamp));
    }

    tracker.finish();
    log::debug!(
        "Extraction pass ({:?}) kept {} of {} samples ({duplicates} duplicates)",
        plan.strategy(),
        accepted.len(),
        plan.len(),
    );

    Ok(accepted)
}
