mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use motion_coach::config::{ConfigUpdate, EngineConfig, FilterParameterUpdate};
use motion_coach::models::{CocoKeypoint, ExerciseType, MovementPhase};
use motion_coach::{AnalysisEngine, MotionError};

use motion_coach::analyzers::{ExerciseDetector, PlankAnalyzer, PushUpAnalyzer};
use motion_coach::services::KeypointProcessor;

use common::{alternate, feed, unfiltered_engine, PoseGenerator, FRAME_MS};

/// Five standing frames, then three squats of five frames down and five up
fn squat_session() -> Vec<Vec<motion_coach::Keypoint>> {
    let mut poses = vec![PoseGenerator::standing(); 5];
    poses.extend(alternate(&PoseGenerator::squat(true), &PoseGenerator::standing(), 6, 5));
    poses
}

#[test]
fn test_standing_still_stays_idle() {
    let mut engine = AnalysisEngine::default();
    let results = feed(&mut engine, 0, &vec![PoseGenerator::standing(); 30]);

    for result in &results {
        assert!(result.is_idle());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.rep_count, None);
        assert!(result.recommendations.is_empty());
    }
    let stats = engine.statistics();
    assert_eq!(stats.frames_processed, 30);
    assert_eq!(stats.active_frames, 0);
    assert_eq!(stats.average_confidence, None);
    assert_eq!(stats.current_exercise, ExerciseType::Idle);
}

#[test]
fn test_squat_session_counts_reps() {
    let mut engine = unfiltered_engine();
    let results = feed(&mut engine, 0, &squat_session());

    assert!(results[..5].iter().all(|r| r.is_idle()));
    assert!(results[5..].iter().all(|r| r.exercise_type == ExerciseType::Squat));

    let last = results.last().unwrap();
    assert_eq!(last.rep_count, Some(3));
    assert_eq!(last.phase, Some(MovementPhase::Top));
    assert!(last.confidence > 0.0 && last.confidence <= 1.0);
    let score = last.overall_score.unwrap();
    assert!((0.0..=100.0).contains(&score), "score {score}");
    assert!(last.recommendations.len() <= 5);
    assert!(last.error.is_none());

    let stats = engine.statistics();
    assert_eq!(stats.frames_processed, 35);
    assert_eq!(stats.active_frames, 30);
    assert_eq!(stats.exercise_frames.get(&ExerciseType::Squat), Some(&30));
    assert_eq!(stats.reps.get(&ExerciseType::Squat), Some(&3));
    assert_eq!(stats.current_exercise, ExerciseType::Squat);
    assert!(stats.average_confidence.is_some());
}

#[test]
fn test_biomechanics_attached_while_active() {
    let mut engine = unfiltered_engine();
    let results = feed(&mut engine, 0, &squat_session());
    let last = results.last().unwrap();

    let bio = &last.biomechanics;
    assert!(!bio.joint_angles.is_empty());
    assert!(bio.symmetry.is_some());
    assert!(bio.energy.is_some());
    assert!(engine.statistics().energy.mechanical_work_j >= 0.0);
}

#[test]
fn test_jumping_jacks_detected_from_transitions() {
    let mut engine = unfiltered_engine();
    let poses = alternate(
        &PoseGenerator::jumping_jack(false),
        &PoseGenerator::jumping_jack(true),
        9,
        5,
    );
    let results = feed(&mut engine, 0, &poses);

    // Three open/closed transitions are needed before the confidence clears the threshold
    assert!(results[..15].iter().all(|r| r.is_idle()));
    assert_eq!(results[15].exercise_type, ExerciseType::JumpingJack);

    let last = results.last().unwrap();
    assert_eq!(last.exercise_type, ExerciseType::JumpingJack);
    assert_eq!(last.rep_count, Some(3));
}

#[test]
fn test_switch_waits_for_cooldown() {
    let mut engine = unfiltered_engine();
    let mut poses = vec![PoseGenerator::standing(); 5];
    poses.extend(vec![PoseGenerator::squat(true); 5]);
    poses.extend(alternate(
        &PoseGenerator::jumping_jack(false),
        &PoseGenerator::jumping_jack(true),
        40,
        1,
    ));
    let results = feed(&mut engine, 0, &poses);

    // Switched to squat at frame 5; the cooldown is one second (30 frames)
    assert_eq!(results[5].exercise_type, ExerciseType::Squat);
    assert!(results[5..35].iter().all(|r| r.exercise_type == ExerciseType::Squat));
    assert_eq!(results.last().unwrap().exercise_type, ExerciseType::JumpingJack);
}

#[test]
fn test_active_exercise_falls_back_to_idle_after_cooldown() {
    let mut engine = unfiltered_engine();
    let mut poses = squat_session();
    poses.extend(vec![Vec::new(); 40]);
    let results = feed(&mut engine, 0, &poses);

    // Squat became active at frame 5; nothing is detected from frame 35 on
    assert_eq!(results[34].exercise_type, ExerciseType::Squat);
    let first_idle = results[35..]
        .iter()
        .position(|r| r.is_idle())
        .map(|i| i + 35)
        .expect("engine never returned to idle");
    assert!(first_idle as f64 * FRAME_MS - 5.0 * FRAME_MS >= 1000.0);
    assert!(results[first_idle..].iter().all(|r| r.is_idle() && r.confidence == 0.0));
    assert_eq!(engine.current_exercise(), ExerciseType::Idle);
    assert_eq!(engine.state().current, None);
}

#[test]
fn test_active_exercise_kept_while_its_own_confidence_holds() {
    let mut engine = unfiltered_engine();
    let hold = PoseGenerator::push_up(false);
    let results = feed(&mut engine, 0, &vec![hold.clone(); 40]);

    assert!(results.iter().all(|r| r.exercise_type == ExerciseType::PushUp));

    // A still body now reads as a plank hold, yet push-up keeps its slot
    let processor = KeypointProcessor::new();
    let plank = PlankAnalyzer::new(processor).detect_exercise(&hold, engine.frame_history());
    let push_up = PushUpAnalyzer::new(processor).detect_exercise(&hold, engine.frame_history());
    assert!(plank > push_up, "plank {plank} vs push-up {push_up}");
    assert!(push_up >= engine.config().confidence_threshold / 2.0);
    assert_eq!(engine.current_exercise(), ExerciseType::PushUp);
}

#[test]
fn test_analyzer_failure_is_reported_in_result() {
    let mut engine = unfiltered_engine();
    let mut poses = alternate(&PoseGenerator::push_up(false), &PoseGenerator::push_up(true), 5, 5);
    poses.push(PoseGenerator::without(
        PoseGenerator::push_up(false),
        &[CocoKeypoint::LeftElbow, CocoKeypoint::RightElbow],
    ));
    let (failing, reps) = poses.split_last().unwrap();
    let results = feed(&mut engine, 0, reps);

    assert_eq!(results[0].exercise_type, ExerciseType::PushUp);
    assert_eq!(results[24].rep_count, Some(2));

    let before = engine.statistics();
    let failed = engine.process_frame(failing, reps.len() as f64 * FRAME_MS, FRAME_MS / 1000.0);
    assert_eq!(failed.exercise_type, ExerciseType::PushUp);
    assert_eq!(failed.error.as_deref(), Some("Missing keypoints for elbow"));
    assert_eq!(failed.rep_count, None);
    assert_eq!(failed.overall_score, None);
    assert!(failed.biomechanics.power.is_none());

    // The failure does not disturb the session or its totals
    assert_eq!(engine.current_exercise(), ExerciseType::PushUp);
    let after = engine.statistics();
    assert_eq!(after.power.samples, before.power.samples);
    assert_eq!(after.energy, before.energy);
}

#[test]
fn test_rejected_config_leaves_engine_unchanged() {
    let mut engine = AnalysisEngine::default();
    let before = engine.config().clone();

    let err = engine
        .update_config(&ConfigUpdate {
            confidence_threshold: Some(1.5),
            max_history_length: Some(0),
            ..Default::default()
        })
        .unwrap_err();

    assert_matches!(err, MotionError::InvalidConfig(ref v) if v.len() == 2);
    assert_eq!(engine.config(), &before);
    assert_eq!(engine.frame_history().capacity(), before.max_history_length);
}

#[test]
fn test_history_length_update_resizes_windows() {
    let mut engine = AnalysisEngine::default();
    feed(&mut engine, 0, &vec![PoseGenerator::standing(); 40]);
    assert_eq!(engine.frame_history().len(), 30);

    engine
        .update_config(&ConfigUpdate {
            max_history_length: Some(10),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(engine.frame_history().len(), 10);
    assert_eq!(engine.frame_history().capacity(), 10);
    assert_eq!(engine.kinematics().window(), 10);
    assert_eq!(engine.config().max_history_length, 10);
}

#[test]
fn test_filter_parameter_updates() {
    let mut engine = AnalysisEngine::default();
    let before = engine.config().filter;

    let err = engine
        .update_filter_parameters(&FilterParameterUpdate {
            beta: Some(-1.0),
            ..Default::default()
        })
        .unwrap_err();
    assert_matches!(err, MotionError::InvalidFilterParameters(_));
    assert_eq!(engine.config().filter, before);

    let update = FilterParameterUpdate {
        beta: Some(0.5),
        ..Default::default()
    };
    assert_eq!(engine.update_filter_parameters(&update), Ok(true));
    assert_eq!(engine.update_filter_parameters(&update), Ok(false));
    assert_eq!(engine.config().filter.beta, 0.5);
    assert_eq!(engine.filter_bank().parameters().beta, 0.5);
}

#[test]
fn test_body_parameters() {
    let mut engine = AnalysisEngine::default();
    let height = engine.body_parameters().height_m();

    assert_matches!(
        engine.set_body_parameters(0.1, 70.0),
        Err(MotionError::InvalidBodyParameters(_))
    );
    assert_eq!(engine.body_parameters().height_m(), height);

    engine.set_body_parameters(1.9, 90.0).unwrap();
    assert_eq!(engine.body_parameters().mass_kg(), 90.0);
}

#[test]
fn test_disabled_biomechanics_are_omitted() {
    let mut engine = unfiltered_engine();
    engine
        .update_config(&ConfigUpdate {
            enable_biomechanics: Some(false),
            enable_kinematics: Some(false),
            ..Default::default()
        })
        .unwrap();
    let results = feed(&mut engine, 0, &squat_session());
    let last = results.last().unwrap();

    assert_eq!(last.exercise_type, ExerciseType::Squat);
    assert!(last.biomechanics.joint_angles.is_empty());
    assert!(last.biomechanics.power.is_none());
    assert!(last.motion.is_none());
    // Form score alone drives the overall score
    let (overall, form) = (last.overall_score.unwrap(), last.form_score.unwrap());
    assert!((overall - form).abs() < 1e-9, "{overall} vs {form}");
}

#[test]
fn test_reset_returns_to_idle() {
    let mut engine = unfiltered_engine();
    feed(&mut engine, 0, &squat_session());
    assert_eq!(engine.current_exercise(), ExerciseType::Squat);

    engine.reset();

    assert_eq!(engine.current_exercise(), ExerciseType::Idle);
    assert!(engine.frame_history().is_empty());
    let stats = engine.statistics();
    assert_eq!(stats.frames_processed, 0);
    assert!(stats.reps.is_empty());
    assert_eq!(stats.energy.calories_kcal, 0.0);

    let result = engine.process_frame(&PoseGenerator::standing(), 0.0, 0.0);
    assert!(result.is_idle());
}

#[test]
fn test_repeated_timestamp_is_tolerated() {
    let mut engine = AnalysisEngine::default();
    let first = engine.process_frame(&PoseGenerator::standing(), 100.0, 0.0);
    let second = engine.process_frame(&PoseGenerator::standing(), 100.0, 0.0);
    assert_eq!(first.keypoints.len(), second.keypoints.len());
    assert!(second.keypoints.iter().all(|k| k.x.is_finite() && k.y.is_finite()));
}

#[test]
fn test_result_serializes_to_json() {
    let mut engine = unfiltered_engine();
    let results = feed(&mut engine, 0, &squat_session());
    let json = serde_json::to_value(results.last().unwrap()).unwrap();

    assert_eq!(json["exercise_type"], "squat");
    assert_eq!(json["rep_count"], 3);
    assert!(json["keypoints"].as_array().unwrap().len() == 17);
    assert!(json.get("error").is_none());
}

fn pose_library() -> Vec<Vec<motion_coach::Keypoint>> {
    vec![
        PoseGenerator::standing(),
        PoseGenerator::squat(true),
        PoseGenerator::jumping_jack(false),
        PoseGenerator::jumping_jack(true),
        PoseGenerator::push_up(false),
        PoseGenerator::push_up(true),
        Vec::new(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_classification_changes_respect_cooldown(
        choices in prop::collection::vec((0usize..7, 1usize..8), 1..25),
        step_ms in 10.0f64..120.0,
        cooldown_ms in 100u64..1500,
    ) {
        let config = EngineConfig {
            switch_cooldown_ms: cooldown_ms,
            enable_filtering: false,
            ..Default::default()
        };
        let mut engine = AnalysisEngine::new(config).unwrap();
        let library = pose_library();

        let mut timestamp = 0.0;
        let mut previous = ExerciseType::Idle;
        let mut last_change: Option<f64> = None;
        for (pose, hold) in choices {
            for _ in 0..hold {
                timestamp += step_ms;
                let result = engine.process_frame(&library[pose], timestamp, step_ms / 1000.0);

                prop_assert!((0.0..=1.0).contains(&result.confidence));
                if result.is_idle() {
                    prop_assert_eq!(result.confidence, 0.0);
                }
                if let Some(score) = result.overall_score {
                    prop_assert!((0.0..=100.0).contains(&score));
                }

                if result.exercise_type != previous {
                    if let Some(last) = last_change {
                        prop_assert!(timestamp - last >= cooldown_ms as f64);
                    }
                    last_change = Some(timestamp);
                    previous = result.exercise_type;
                }
            }
        }
    }
}

