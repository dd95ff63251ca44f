use crate::analyzers::{
    angle_series, body_line_angle, clamp01, hip_deviation, horizontal_score, spread, ExerciseContext,
    ExerciseDetector, HipDeviation, RepCounter,
};
use crate::errors::AnalysisError;
use crate::models::analysis::{ExerciseFeedback, ExerciseType, IssueSeverity, MovementIssue};
use crate::models::body::Joint;
use crate::models::history::RingBuffer;
use crate::models::keypoint::{CocoKeypoint, Keypoint, PoseFrame};
use crate::services::keypoint_processor::KeypointProcessor;

pub const PUSH_UP_FLEXED_DEG: f64 = 90.0;
pub const PUSH_UP_EXTENDED_DEG: f64 = 150.0;

/// Shoulder-hip-ankle angle under which the body no longer counts as straight
pub const STRAIGHT_BODY_DEG: f64 = 160.0;
const SHALLOW_DEPTH_DEG: f64 = 100.0;

/// Score shared by the horizontal-body exercises: straight line plus hands under shoulders
pub(crate) fn support_pose_score(processor: &KeypointProcessor, keypoints: &[Keypoint]) -> Option<f64> {
    if horizontal_score(processor, keypoints)? == 0.0 {
        return Some(0.0);
    }

    let line = body_line_angle(processor, keypoints).map_or(0.3, |angle| clamp01((angle - 120.0) / 50.0));
    let shoulder_y = processor.shoulder_center(keypoints).map(|s| s.y);
    let wrist_y = [CocoKeypoint::LeftWrist, CocoKeypoint::RightWrist]
        .iter()
        .filter_map(|w| processor.point(keypoints, *w))
        .map(|w| w.y)
        .fold(None, |lowest: Option<f64>, y| Some(lowest.map_or(y, |l| l.max(y))));
    let support = match (shoulder_y, wrist_y) {
        (Some(shoulder), Some(wrist)) if wrist > shoulder => 1.0,
        (Some(_), Some(_)) => 0.0,
        _ => 0.5,
    };

    Some(0.5 * line + 0.2 * support)
}

#[derive(Debug, Clone)]
pub struct PushUpAnalyzer {
    processor: KeypointProcessor,
    reps: RepCounter,
}

impl PushUpAnalyzer {
    pub fn new(processor: KeypointProcessor) -> Self {
        Self {
            processor,
            reps: RepCounter::new(PUSH_UP_FLEXED_DEG, PUSH_UP_EXTENDED_DEG),
        }
    }
}

impl ExerciseDetector for PushUpAnalyzer {
    fn exercise_type(&self) -> ExerciseType {
        ExerciseType::PushUp
    }

    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64 {
        let p = &self.processor;
        let Some(pose) = support_pose_score(p, keypoints) else {
            return 0.0;
        };
        if pose == 0.0 {
            return 0.0;
        }
        let elbow_travel = spread(&angle_series(p, history, Joint::LeftElbow, Joint::RightElbow));
        clamp01(pose + 0.3 * clamp01(elbow_travel / 40.0))
    }

    fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        _history: &RingBuffer<PoseFrame>,
        _context: &ExerciseContext<'_>,
    ) -> Result<ExerciseFeedback, AnalysisError> {
        let p = self.processor;
        let elbow = p
            .bilateral_angle(keypoints, Joint::LeftElbow, Joint::RightElbow)
            .ok_or(AnalysisError::MissingKeypoints("elbow"))?;
        let line = body_line_angle(&p, keypoints);

        let update = self.reps.update(elbow);
        let mut feedback = ExerciseFeedback::new(ExerciseType::PushUp, update.phase, self.reps.count())
            .with_angle("elbow", Some(elbow))
            .with_angle("body_line", line);

        if line.is_some_and(|angle| angle < STRAIGHT_BODY_DEG) {
            let issue = match hip_deviation(&p, keypoints)? {
                HipDeviation::Sag => MovementIssue::new(
                    IssueSeverity::Warning,
                    "hip_sag",
                    "Hips are sagging, brace your core to keep a straight line",
                ),
                HipDeviation::Pike => MovementIssue::new(
                    IssueSeverity::Warning,
                    "hip_pike",
                    "Hips are too high, lower them in line with shoulders and ankles",
                ),
            };
            feedback.flag(issue);
        }
        if update.completed.is_some_and(|deepest| deepest > SHALLOW_DEPTH_DEG) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Warning,
                "shallow_depth",
                "Lower your chest until the elbows reach 90 degrees",
            ));
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
