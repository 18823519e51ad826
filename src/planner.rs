//! Sample planning.
//!
//! Turns a source duration into the ordered list of timestamps the extractor
//! visits. The initial pass spreads a fixed number of samples uniformly over
//! a trimmed window that skips the first and last half second (where fades
//! and black frames cluster). The retry pass, used when the initial pass finds
//! too few distinct frames, walks the clip at a fixed cadence instead.

use crate::error::PreviewError;

/// Fewest frames a derived plan contains.
pub const MIN_FRAME_COUNT: usize = 8;
/// Most frames a derived plan contains.
pub const MAX_FRAME_COUNT: usize = 30;

/// Timestamps are kept this far (seconds) before the end of the stream.
const END_EPSILON: f64 = 0.001;

/// How a [`SamplePlan`] was laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// A fixed number of samples spread evenly over the trimmed window.
    Uniform,
    /// One sample every `max(0.5, duration / 10)` seconds.
    FixedInterval,
}

/// An ordered, strictly increasing list of sample timestamps (seconds), each
/// inside `(0, duration)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePlan {
    timestamps: Vec<f64>,
    strategy: SamplingStrategy,
    duration: f64,
}

impl SamplePlan {
    /// The planned timestamps, in visiting order.
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Number of planned samples.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Returns `true` if the plan has no samples.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// How the plan was laid out.
    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// Duration of the source the plan was computed for.
    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// Derive the sample count from the source duration: roughly one frame per
/// second, clamped to `[MIN_FRAME_COUNT, MAX_FRAME_COUNT]`.
///
/// ```
/// assert_eq!(loopclip::planner::derive_frame_count(10.0), 10);
/// assert_eq!(loopclip::planner::derive_frame_count(3.0), 8);
/// assert_eq!(loopclip::planner::derive_frame_count(40.0), 30);
/// ```
pub fn derive_frame_count(duration: f64) -> usize {
    let per_second = duration.ceil();
    if !per_second.is_finite() || per_second <= MIN_FRAME_COUNT as f64 {
        return MIN_FRAME_COUNT;
    }
    (per_second as usize).clamp(MIN_FRAME_COUNT, MAX_FRAME_COUNT)
}

/// The trimmed window `[start, end]` the uniform plan samples from.
///
/// `start = min(0.5, 0.05·d)`, `end = max(d − 0.5, 0.95·d)`.
pub fn sampling_window(duration: f64) -> (f64, f64) {
    let start = 0.5_f64.min(0.05 * duration);
    let end = (duration - 0.5).max(0.95 * duration);
    (start, end)
}

/// Plan the initial pass.
///
/// Spreads `requested` samples (or [`derive_frame_count`] of them when `None`)
/// evenly across [`sampling_window`], endpoints included.
///
/// # Errors
///
/// - [`PreviewError::InvalidDuration`] if `duration` is not a positive, finite
///   number.
/// - [`PreviewError::InvalidConfiguration`] if `requested` is `Some(0)`.
pub fn plan(duration: f64, requested: Option<usize>) -> Result<SamplePlan, PreviewError> {
    check_duration(duration)?;
    let count = match requested {
        Some(0) => {
            return Err(PreviewError::InvalidConfiguration(
                "requested frame count must be at least 1".to_string(),
            ));
        }
        Some(count) => count,
        None => derive_frame_count(duration),
    };

    let (start, end) = sampling_window(duration);
    let limit = latest_sample(duration);

    let timestamps: Vec<f64> = if count == 1 {
        vec![start.min(limit)]
    } else {
        let step = (end - start) / (count - 1) as f64;
        (0..count)
            .map(|index| (start + step * index as f64).min(limit))
            .collect()
    };

    log::debug!(
        "Planned {} uniform samples over [{start:.3}, {end:.3}] of {duration:.3}s",
        timestamps.len(),
    );

    Ok(SamplePlan {
        timestamps,
        strategy: SamplingStrategy::Uniform,
        duration,
    })
}

/// Plan the retry pass.
///
/// Walks `[0.5, d − 0.5]` with step `max(0.5, d / 10)`. Clips too short to
/// have that window (under one second) get a single sample at the midpoint.
///
/// # Errors
///
/// Returns [`PreviewError::InvalidDuration`] if `duration` is not a positive,
/// finite number.
pub fn plan_fixed_interval(duration: f64) -> Result<SamplePlan, PreviewError> {
    check_duration(duration)?;

    let first = 0.5;
    let last = duration - 0.5;
    let step = 0.5_f64.max(duration / 10.0);

    let timestamps: Vec<f64> = if last < first {
        vec![duration / 2.0]
    } else {
        // Index-based to avoid accumulating float error over many steps.
        let steps = ((last - first) / step).floor() as usize;
        let limit = latest_sample(duration);
        (0..=steps)
            .map(|index| (first + step * index as f64).min(limit))
            .collect()
    };

    log::debug!(
        "Planned {} fixed-interval samples (step {step:.3}s) of {duration:.3}s",
        timestamps.len(),
    );

    Ok(SamplePlan {
        timestamps,
        strategy: SamplingStrategy::FixedInterval,
        duration,
    })
}

/// The last timestamp a plan may use: a hair before the end, and strictly
/// below `duration` even where subtracting the epsilon rounds back to it.
fn latest_sample(duration: f64) -> f64 {
    let below = f64::from_bits(duration.to_bits() - 1);
    (duration - END_EPSILON.min(duration * 0.01)).min(below)
}

fn check_duration(duration: f64) -> Result<(), PreviewError> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(PreviewError::InvalidDuration(duration))
    }
}
