//! Sample planner tests.

use loopclip::planner::{
    MAX_FRAME_COUNT, MIN_FRAME_COUNT, derive_frame_count, plan, plan_fixed_interval,
    sampling_window,
};
use loopclip::{PreviewError, SamplingStrategy};

fn assert_strictly_increasing_within(timestamps: &[f64], duration: f64) {
    for pair in timestamps.windows(2) {
        assert!(pair[0] < pair[1], "not increasing: {pair:?}");
    }
    for &timestamp in timestamps {
        assert!(
            timestamp > 0.0 && timestamp < duration,
            "{timestamp} outside (0, {duration})"
        );
    }
}

// ── Frame count derivation ─────────────────────────────────────────

#[test]
fn ten_second_clip_gets_ten_frames() {
    assert_eq!(derive_frame_count(10.0), 10);
    assert_eq!(plan(10.0, None).unwrap().len(), 10);
}

#[test]
fn forty_second_clip_is_capped() {
    assert_eq!(derive_frame_count(40.0), MAX_FRAME_COUNT);
    assert_eq!(plan(40.0, None).unwrap().len(), 30);
}

#[test]
fn three_second_clip_is_floored() {
    assert_eq!(derive_frame_count(3.0), MIN_FRAME_COUNT);
    assert_eq!(plan(3.0, None).unwrap().len(), 8);
}

#[test]
fn fractional_durations_round_up() {
    assert_eq!(derive_frame_count(12.1), 13);
    assert_eq!(derive_frame_count(29.5), 30);
}

#[test]
fn derived_plans_hold_between_eight_and_thirty_samples() {
    let durations = [
        0.01, 0.2, 0.9, 1.0, 2.5, 7.99, 8.0, 9.3, 15.0, 29.0, 30.0, 31.0, 120.0, 3600.0, 1e16,
        1e300,
    ];
    for duration in durations {
        let plan = plan(duration, None).unwrap();
        assert!(
            (MIN_FRAME_COUNT..=MAX_FRAME_COUNT).contains(&plan.len()),
            "{duration}s planned {} samples",
            plan.len()
        );
        assert_strictly_increasing_within(plan.timestamps(), duration);
        assert_eq!(plan.strategy(), SamplingStrategy::Uniform);
    }
}

// ── Sampling window ────────────────────────────────────────────────

#[test]
fn window_trims_half_a_second_on_long_clips() {
    let (start, end) = sampling_window(20.0);
    assert!((start - 0.5).abs() < 1e-9);
    assert!((end - 19.5).abs() < 1e-9);
}

#[test]
fn window_trims_five_percent_on_short_clips() {
    let (start, end) = sampling_window(4.0);
    assert!((start - 0.2).abs() < 1e-9);
    assert!((end - 3.8).abs() < 1e-9);
}

#[test]
fn uniform_plan_includes_both_window_edges() {
    let plan = plan(10.0, None).unwrap();
    let timestamps = plan.timestamps();
    assert!((timestamps[0] - 0.5).abs() < 1e-9);
    assert!((timestamps[9] - 9.5).abs() < 1e-9);
    // Nine equal segments between the edges.
    let step = timestamps[1] - timestamps[0];
    assert!((step - 1.0).abs() < 1e-9);
}

#[test]
fn explicit_count_overrides_derivation() {
    let plan = plan(10.0, Some(4)).unwrap();
    assert_eq!(plan.len(), 4);
    assert_strictly_increasing_within(plan.timestamps(), 10.0);
}

#[test]
fn single_sample_sits_at_window_start() {
    let plan = plan(10.0, Some(1)).unwrap();
    assert_eq!(plan.timestamps(), &[0.5]);
}

#[test]
fn zero_requested_frames_is_rejected() {
    assert!(matches!(
        plan(10.0, Some(0)),
        Err(PreviewError::InvalidConfiguration(_))
    ));
}

#[test]
fn unusable_durations_are_rejected() {
    for duration in [0.0, -3.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            plan(duration, None),
            Err(PreviewError::InvalidDuration(_))
        ));
        assert!(matches!(
            plan_fixed_interval(duration),
            Err(PreviewError::InvalidDuration(_))
        ));
    }
}

// ── Fixed-interval retry plan ──────────────────────────────────────

#[test]
fn retry_plan_steps_half_a_second_on_short_clips() {
    let plan = plan_fixed_interval(3.0).unwrap();
    assert_eq!(plan.strategy(), SamplingStrategy::FixedInterval);
    assert_eq!(plan.timestamps(), &[0.5, 1.0, 1.5, 2.0, 2.5]);
}

#[test]
fn retry_plan_steps_a_tenth_of_long_clips() {
    let plan = plan_fixed_interval(40.0).unwrap();
    // 0.5, 4.5, ..., 36.5
    assert_eq!(plan.len(), 10);
    assert!((plan.timestamps()[1] - 4.5).abs() < 1e-9);
    assert!(*plan.timestamps().last().unwrap() <= 39.5);
    assert_strictly_increasing_within(plan.timestamps(), 40.0);
}

#[test]
fn retry_plan_for_sub_second_clip_is_the_midpoint() {
    let plan = plan_fixed_interval(0.6).unwrap();
    assert_eq!(plan.timestamps(), &[0.3]);
}

#[test]
fn retry_plan_stays_inside_the_clip() {
    for duration in [0.05, 1.0, 1.7, 6.0, 59.9, 600.0, 1e16] {
        let plan = plan_fixed_interval(duration).unwrap();
        assert!(!plan.is_empty());
        assert_strictly_increasing_within(plan.timestamps(), duration);
        assert_eq!(plan.duration(), duration);
    }
}
