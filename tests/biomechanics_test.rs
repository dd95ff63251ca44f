mod common;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use motion_coach::models::{CocoKeypoint, ExerciseType, Joint, Keypoint, MotionPattern, Point2, KEYPOINT_COUNT};
use motion_coach::services::keypoint_processor::angle_between;
use motion_coach::services::{BiomechanicsEngine, FilterBank, KinematicsTracker};

use common::{alternate, PoseGenerator, FRAME_MS};

fn spread(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::MIN, f64::max);
    let min = values.iter().cloned().fold(f64::MAX, f64::min);
    max - min
}

#[test]
fn test_filter_damps_jitter() {
    let mut bank = FilterBank::new();
    let nose = CocoKeypoint::Nose.index();

    let mut raw_x = Vec::new();
    let mut smoothed_x = Vec::new();
    for i in 0..60 {
        let mut kps = PoseGenerator::standing();
        let jitter = if i % 2 == 0 { 5.0 } else { -5.0 };
        kps[nose].x += jitter;
        raw_x.push(kps[nose].x);
        smoothed_x.push(bank.filter_frame(&kps, i as f64 * FRAME_MS)[nose].x);
    }

    assert!(spread(&smoothed_x[20..]) < spread(&raw_x[20..]) / 2.0);
    assert_eq!(bank.stats().frames_filtered, 60);
}

#[test]
fn test_filter_passes_low_confidence_keypoints_through() {
    let mut bank = FilterBank::new();
    bank.filter_frame(&PoseGenerator::standing(), 0.0);

    let mut kps = PoseGenerator::standing();
    kps[CocoKeypoint::Nose.index()] = Keypoint::new(999.0, 999.0, 0.05);
    let filtered = bank.filter_frame(&kps, FRAME_MS);

    assert_eq!(filtered[CocoKeypoint::Nose.index()], Keypoint::new(999.0, 999.0, 0.05));
}

#[test]
fn test_disabled_filter_is_identity() {
    let mut bank = FilterBank::new();
    bank.set_enabled(false);
    let kps = PoseGenerator::squat(true);
    assert_eq!(bank.filter_frame(&kps, 0.0), kps);
    assert_eq!(bank.stats().frames_filtered, 0);
}

#[test]
fn test_kinematics_of_a_sliding_wrist() {
    let mut tracker = KinematicsTracker::default();
    let wrist = CocoKeypoint::LeftWrist.index();

    for i in 0..10 {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT];
        kps[wrist] = Keypoint::new(100.0 + 10.0 * i as f64, 300.0, 0.9);
        tracker.update(&kps, i as f64 * FRAME_MS, FRAME_MS / 1000.0);
    }

    let velocity = tracker.velocity(wrist).unwrap();
    assert!((velocity.x - 300.0).abs() < 1e-6, "vx {}", velocity.x);
    assert!(velocity.y.abs() < 1e-9);
    assert_eq!(tracker.motion_pattern(wrist), Some(MotionPattern::Linear));
    assert_eq!(tracker.velocity(CocoKeypoint::Nose.index()), None);

    let summary = tracker.summary().unwrap();
    assert!((summary.peak_speed - 300.0).abs() < 1e-6);
}

#[test]
fn test_session_energy_grows_with_movement() {
    let mut engine = BiomechanicsEngine::default();
    let mut totals = Vec::new();

    for kps in alternate(&PoseGenerator::standing(), &PoseGenerator::squat(true), 6, 3) {
        let report = engine.analyze(&kps, FRAME_MS / 1000.0, ExerciseType::Squat, None);
        assert!(report.risk.is_some());
        totals.push(engine.session_energy().calories_kcal);
    }

    assert!(totals.windows(2).all(|w| w[1] >= w[0]));
    assert!(totals.last().copied().unwrap_or_default() > 0.0);
    assert!(engine.power_statistics().peak > 0.0);
}

#[test]
fn test_missing_limb_drops_only_its_joints() {
    let mut engine = BiomechanicsEngine::default();
    let poses = [PoseGenerator::squat(true), PoseGenerator::standing(), PoseGenerator::squat(true)];

    let mut report = None;
    for kps in poses {
        let kps = PoseGenerator::without(kps, &[CocoKeypoint::LeftKnee]);
        report = Some(engine.analyze(&kps, FRAME_MS / 1000.0, ExerciseType::Squat, None));
    }
    let report = report.unwrap();
    let power = report.power.as_ref().unwrap();

    assert!(!report.joint_angles.contains_key(&Joint::LeftKnee));
    assert!(!report.angular_velocities.contains_key(&Joint::LeftKnee));
    assert!(!report.moments.contains_key(&Joint::LeftKnee));
    assert!(!power.per_joint.contains_key(&Joint::LeftKnee));

    assert!(report.moments.contains_key(&Joint::RightKnee));
    assert!(power.per_joint.get(&Joint::RightKnee).is_some_and(|p| *p > 0.0));
    assert!(report.energy.is_some());
}

proptest! {
    #[test]
    fn prop_filtered_values_stay_within_input_hull(
        samples in prop::collection::vec((0.0f64..640.0, 1.0f64..100.0), 1..60),
    ) {
        let mut bank = FilterBank::new();
        let nose = CocoKeypoint::Nose.index();
        let (mut lo, mut hi) = (f64::MAX, f64::MIN);
        let mut timestamp = 0.0;

        for (x, step) in samples {
            timestamp += step;
            lo = lo.min(x);
            hi = hi.max(x);
            let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT];
            kps[nose] = Keypoint::new(x, 200.0, 0.9);

            let out = bank.filter_frame(&kps, timestamp)[nose];
            prop_assert!(out.x.is_finite());
            prop_assert!(out.x >= lo - 1e-9 && out.x <= hi + 1e-9, "{} outside [{}, {}]", out.x, lo, hi);
            prop_assert_eq!(out.score, 0.9);
        }
    }

    #[test]
    fn prop_three_point_angles_are_bounded(
        ax in -500.0f64..500.0, ay in -500.0f64..500.0,
        bx in -500.0f64..500.0, by in -500.0f64..500.0,
        cx in -500.0f64..500.0, cy in -500.0f64..500.0,
    ) {
        let angle = angle_between(Point2::new(ax, ay), Point2::new(bx, by), Point2::new(cx, cy));
        prop_assert!((0.0..=180.0).contains(&angle), "angle {}", angle);
    }
}
