use crate::analyzers::{angle_series, clamp01, spread, ExerciseContext, ExerciseDetector, RepCounter};
use crate::errors::AnalysisError;
use crate::models::analysis::{ExerciseFeedback, ExerciseType, IssueSeverity, MovementIssue};
use crate::models::body::Joint;
use crate::models::history::RingBuffer;
use crate::models::keypoint::{CocoKeypoint, Keypoint, PoseFrame};
use crate::services::keypoint_processor::KeypointProcessor;

/// Knee angle at or below which the squat is at the bottom
pub const SQUAT_FLEXED_DEG: f64 = 100.0;
/// Knee angle at or above which the athlete is standing
pub const SQUAT_EXTENDED_DEG: f64 = 160.0;

/// Repetitions whose deepest knee angle stays above this are shallow
const SHALLOW_DEPTH_DEG: f64 = 110.0;
const MAX_TORSO_LEAN_DEG: f64 = 45.0;
const KNEE_ASYMMETRY_DEG: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct SquatAnalyzer {
    processor: KeypointProcessor,
    reps: RepCounter,
}

impl SquatAnalyzer {
    pub fn new(processor: KeypointProcessor) -> Self {
        Self {
            processor,
            reps: RepCounter::new(SQUAT_FLEXED_DEG, SQUAT_EXTENDED_DEG),
        }
    }

    /// Knees collapsing inwards, only measurable from the front
    fn knee_valgus(&self, keypoints: &[Keypoint]) -> bool {
        let p = &self.processor;
        let (Some(lk), Some(rk), Some(la), Some(ra)) = (
            p.point(keypoints, CocoKeypoint::LeftKnee),
            p.point(keypoints, CocoKeypoint::RightKnee),
            p.point(keypoints, CocoKeypoint::LeftAnkle),
            p.point(keypoints, CocoKeypoint::RightAnkle),
        ) else {
            return false;
        };
        let ankle_width = (la.x - ra.x).abs();
        ankle_width > 20.0 && (lk.x - rk.x).abs() < 0.7 * ankle_width
    }
}

impl ExerciseDetector for SquatAnalyzer {
    fn exercise_type(&self) -> ExerciseType {
        ExerciseType::Squat
    }

    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64 {
        let p = &self.processor;
        let Some(knee) = p.bilateral_angle(keypoints, Joint::LeftKnee, Joint::RightKnee) else {
            return 0.0;
        };
        let knee_bend = clamp01((170.0 - knee) / 80.0);
        let hip_bend = p
            .bilateral_angle(keypoints, Joint::LeftHip, Joint::RightHip)
            .map_or(0.0, |hip| clamp01((170.0 - hip) / 80.0));

        let orientation = match p.trunk_lean(keypoints) {
            Some(lean) if lean.abs() <= 60.0 => 1.0,
            Some(_) => 0.2,
            None => 0.5,
        };

        let mut confidence = (0.55 * knee_bend + 0.45 * hip_bend) * orientation;

        // Uneven knees or a long stance look like a lunge
        if let (Some(l), Some(r)) = (
            p.joint_angle(keypoints, Joint::LeftKnee),
            p.joint_angle(keypoints, Joint::RightKnee),
        ) {
            if (l - r).abs() > 40.0 {
                confidence *= 0.6;
            }
        }
        if let (Some(la), Some(ra), Some(torso)) = (
            p.point(keypoints, CocoKeypoint::LeftAnkle),
            p.point(keypoints, CocoKeypoint::RightAnkle),
            p.torso_length(keypoints),
        ) {
            if (la.x - ra.x).abs() > 0.6 * torso {
                confidence *= 0.5;
            }
        }

        // Recent knee travel keeps an upright athlete between reps recognisable
        let knee_travel = spread(&angle_series(p, history, Joint::LeftKnee, Joint::RightKnee));
        if orientation >= 1.0 && knee_travel > 30.0 {
            confidence += 0.2;
        }

        clamp01(confidence)
    }

    fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        _history: &RingBuffer<PoseFrame>,
        _context: &ExerciseContext<'_>,
    ) -> Result<ExerciseFeedback, AnalysisError> {
        let p = self.processor;
        let knee = p
            .bilateral_angle(keypoints, Joint::LeftKnee, Joint::RightKnee)
            .ok_or(AnalysisError::MissingKeypoints("knee"))?;
        let hip = p.bilateral_angle(keypoints, Joint::LeftHip, Joint::RightHip);
        let lean = p.trunk_lean(keypoints);

        let update = self.reps.update(knee);
        let mut feedback = ExerciseFeedback::new(ExerciseType::Squat, update.phase, self.reps.count())
            .with_angle("knee", Some(knee))
            .with_angle("hip", hip)
            .with_angle("torso_lean", lean);

        if self.knee_valgus(keypoints) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Critical,
                "knee_valgus",
                "Knees are collapsing inwards, push them out over your toes",
            ));
        }
        if lean.is_some_and(|l| l.abs() > MAX_TORSO_LEAN_DEG) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Warning,
                "forward_lean",
                "Keep your chest up and your back more upright",
            ));
        }
        if update.completed.is_some_and(|deepest| deepest > SHALLOW_DEPTH_DEG) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Warning,
                "shallow_depth",
                "Squat deeper, aim for thighs parallel to the floor",
            ));
        }
        if let (Some(l), Some(r)) = (
            p.joint_angle(keypoints, Joint::LeftKnee),
            p.joint_angle(keypoints, Joint::RightKnee),
        ) {
            if (l - r).abs() > KNEE_ASYMMETRY_DEG {
                feedback.flag(MovementIssue::new(
                    IssueSeverity::Minor,
                    "uneven_knees",
                    "Distribute your weight evenly between both legs",
                ));
            }
        }

        Ok(feedback)
    }

    fn reset(&mut self) {
        self.reps.reset();
    }

    fn set_min_confidence(&mut self, min_confidence: f64) {
        self.processor = self.processor.with_min_confidence(min_confidence);
    }
}
