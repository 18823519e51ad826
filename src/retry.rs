//! Retry controller.
//!
//! A visually static clip (a held pose, a paused recording) can leave the
//! initial uniform pass with fewer distinct frames than a preview needs. The
//! controller then clears the duplicate filter, re-plans at a fixed cadence,
//! and extracts exactly once more. If the second pass still falls short the
//! run fails with [`PreviewError::InsufficientFrames`]; whether a degraded
//! preview is acceptable is the caller's call.
//!
//! Seek and capture failures are never retried.

use crate::configuration::PreviewOptions;
use crate::error::PreviewError;
use crate::extractor::extract;
use crate::fingerprint::DuplicateFilter;
use crate::frame::FrameBuffer;
use crate::media::MediaSource;
use crate::planner::{SamplePlan, plan_fixed_interval};

/// Unique frames gathered by a run, in capture order.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    frames: Vec<FrameBuffer>,
    requested: usize,
    retried: bool,
}

impl ExtractionResult {
    /// The accepted frames, in chronological order.
    pub fn frames(&self) -> &[FrameBuffer] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame count the initial plan asked for. `len()` never exceeds it.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Whether the fixed-interval retry pass produced these frames.
    pub fn retried(&self) -> bool {
        self.retried
    }

    /// Take the frames, consuming the result.
    pub fn into_frames(self) -> Vec<FrameBuffer> {
        self.frames
    }
}

/// Where a run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Extracting along the initial uniform plan.
    Initial,
    /// Extracting along the fixed-interval plan after a shortfall.
    Retrying,
    /// Enough unique frames were gathered.
    Done,
    /// The retry pass also fell short.
    Failed,
}

/// Drives the initial pass and, when needed, the single retry pass.
#[derive(Debug)]
pub struct RetryController {
    state: RetryState,
    filter: DuplicateFilter,
    minimum: usize,
}

impl RetryController {
    /// Create a controller that requires `minimum` unique frames.
    pub fn new(minimum: usize) -> Self {
        Self {
            state: RetryState::Initial,
            filter: DuplicateFilter::new(),
            minimum,
        }
    }

    /// The current state.
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Run extraction along `plan`, retrying once at a fixed cadence if too
    /// few unique frames survive.
    ///
    /// # Errors
    ///
    /// - [`PreviewError::InsufficientFrames`] if the retry pass also falls
    ///   short of the minimum.
    /// - Any error from [`extract`], propagated without a retry.
    pub fn run_with_retry<S: MediaSource + ?Sized>(
        &mut self,
        source: &mut S,
        plan: &SamplePlan,
        options: &PreviewOptions,
    ) -> Result<ExtractionResult, PreviewError> {
        let requested = plan.len();
        self.state = RetryState::Initial;
        self.filter.reset();

        let frames = extract(source, plan, &mut self.filter, options, requested)?;
        if frames.len() >= self.minimum {
            self.state = RetryState::Done;
            return Ok(ExtractionResult {
                frames,
                requested,
                retried: false,
            });
        }

        log::warn!(
            "Only {} unique frames of {requested} requested (need {}); retrying at a fixed interval",
            frames.len(),
            self.minimum,
        );
        self.state = RetryState::Retrying;
        self.filter.reset();
        drop(frames);

        let retry_plan = plan_fixed_interval(plan.duration())?;
        let frames = extract(source, &retry_plan, &mut self.filter, options, requested)?;
        if frames.len() < self.minimum {
            self.state = RetryState::Failed;
            return Err(PreviewError::InsufficientFrames {
                found: frames.len(),
                required: self.minimum,
            });
        }

        self.state = RetryState::Done;
        Ok(ExtractionResult {
            frames,
            requested,
            retried: true,
        })
    }

    /// Number of fingerprints the filter holds for the current pass.
    pub fn seen(&self) -> usize {
        self.filter.len()
    }
}

/// Run extraction with a fresh [`RetryController`] using the configured
/// minimum.
pub fn run_with_retry<S: MediaSource + ?Sized>(
    source: &mut S,
    plan: &SamplePlan,
    options: &PreviewOptions,
) -> Result<ExtractionResult, PreviewError> {
    RetryController::new(options.minimum_unique_frames).run_with_retry(source, plan, options)
}
