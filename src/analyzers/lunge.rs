use crate::analyzers::{angle_series, clamp01, spread, ExerciseContext, ExerciseDetector, RepCounter};
use crate::errors::AnalysisError;
use crate::models::analysis::{ExerciseFeedback, ExerciseType, IssueSeverity, MovementIssue, MovementPhase};
use crate::models::body::Joint;
use crate::models::history::RingBuffer;
use crate::models::keypoint::{CocoKeypoint, Keypoint, PoseFrame};
use crate::services::keypoint_processor::KeypointProcessor;

pub const LUNGE_FLEXED_DEG: f64 = 110.0;
pub const LUNGE_EXTENDED_DEG: f64 = 155.0;

const MAX_TORSO_LEAN_DEG: f64 = 30.0;
const FRONT_KNEE_MIN_DEG: f64 = 70.0;
const BACK_KNEE_BENT_DEG: f64 = 150.0;

#[derive(Debug, Clone)]
pub struct LungeAnalyzer {
    processor: KeypointProcessor,
    reps: RepCounter,
}

impl LungeAnalyzer {
    pub fn new(processor: KeypointProcessor) -> Self {
        Self {
            processor,
            reps: RepCounter::new(LUNGE_FLEXED_DEG, LUNGE_EXTENDED_DEG),
        }
    }

    /// (front, back) knee angles; the more flexed knee leads
    fn knees(&self, keypoints: &[Keypoint]) -> Option<(f64, Option<f64>)> {
        let p = &self.processor;
        match (
            p.joint_angle(keypoints, Joint::LeftKnee),
            p.joint_angle(keypoints, Joint::RightKnee),
        ) {
            (Some(l), Some(r)) => Some((l.min(r), Some(l.max(r)))),
            (Some(v), None) | (None, Some(v)) => Some((v, None)),
            (None, None) => None,
        }
    }

    /// Horizontal ankle separation in torso lengths
    fn stance_length(&self, keypoints: &[Keypoint]) -> Option<f64> {
        let p = &self.processor;
        let left = p.point(keypoints, CocoKeypoint::LeftAnkle)?;
        let right = p.point(keypoints, CocoKeypoint::RightAnkle)?;
        Some((left.x - right.x).abs() / p.torso_length(keypoints)?)
    }
}

impl ExerciseDetector for LungeAnalyzer {
    fn exercise_type(&self) -> ExerciseType {
        ExerciseType::Lunge
    }

    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64 {
        let p = &self.processor;
        let (Some((front, _)), Some(stance)) = (self.knees(keypoints), self.stance_length(keypoints)) else {
            return 0.0;
        };

        let stagger = clamp01((stance - 0.3) / 0.5);
        let bend = clamp01((170.0 - front) / 70.0);
        let orientation = match p.trunk_lean(keypoints) {
            Some(lean) if lean.abs() <= 45.0 => 1.0,
            _ => 0.2,
        };

        let mut confidence = orientation * stagger * (0.4 + 0.6 * bend);
        let knee_travel = spread(&angle_series(p, history, Joint::LeftKnee, Joint::RightKnee));
        if confidence > 0.2 && knee_travel > 30.0 {
            confidence += 0.1;
        }
        clamp01(confidence)
    }

    fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        _history: &RingBuffer<PoseFrame>,
        _context: &ExerciseContext<'_>,
    ) -> Result<ExerciseFeedback, AnalysisError> {
        let (front, back) = self.knees(keypoints).ok_or(AnalysisError::MissingKeypoints("knee"))?;
        let lean = self.processor.trunk_lean(keypoints);

        let update = self.reps.update(front);
        let mut feedback = ExerciseFeedback::new(ExerciseType::Lunge, update.phase, self.reps.count())
            .with_angle("front_knee", Some(front))
            .with_angle("back_knee", back)
            .with_angle("torso_lean", lean);

        if lean.is_some_and(|l| l.abs() > MAX_TORSO_LEAN_DEG) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Warning,
                "forward_lean",
                "Keep your torso upright over your hips",
            ));
        }
        if front < FRONT_KNEE_MIN_DEG {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Warning,
                "front_knee_overbent",
                "Keep your front knee stacked over the ankle",
            ));
        }
        if update.phase == MovementPhase::Bottom && back.is_some_and(|b| b > BACK_KNEE_BENT_DEG) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Minor,
                "shallow_back_knee",
                "Lower your back knee towards the floor",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keypoint::KEYPOINT_COUNT;

    /// Side view, left leg forward; `down` bends both knees to 90°
    fn lunge_pose(down: bool) -> Vec<Keypoint> {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT];
        let mut set = |which: CocoKeypoint, x: f64, y: f64| kps[which.index()] = Keypoint::new(x, y, 0.9);
        let hip_y = if down { 450.0 } else { 380.0 };
        set(CocoKeypoint::LeftShoulder, 300.0, hip_y - 200.0);
        set(CocoKeypoint::RightShoulder, 300.0, hip_y - 200.0);
        set(CocoKeypoint::LeftHip, 300.0, hip_y);
        set(CocoKeypoint::RightHip, 300.0, hip_y);
        if down {
            set(CocoKeypoint::LeftKnee, 420.0, 450.0);
            set(CocoKeypoint::LeftAnkle, 420.0, 600.0);
            set(CocoKeypoint::RightKnee, 300.0, 570.0);
            set(CocoKeypoint::RightAnkle, 180.0, 570.0);
        } else {
            set(CocoKeypoint::LeftKnee, 360.0, 490.0);
            set(CocoKeypoint::LeftAnkle, 420.0, 600.0);
            set(CocoKeypoint::RightKnee, 240.0, 490.0);
            set(CocoKeypoint::RightAnkle, 180.0, 600.0);
        }
        kps
    }

    #[test]
    fn test_staggered_bent_stance_is_a_lunge() {
        let analyzer = LungeAnalyzer::new(KeypointProcessor::new());
        let confidence = analyzer.detect_exercise(&lunge_pose(true), &RingBuffer::new(30));
        assert!(confidence >= 0.6, "confidence {confidence}");
    }

    #[test]
    fn test_counts_lunges() {
        let mut analyzer = LungeAnalyzer::new(KeypointProcessor::new());
        let history = RingBuffer::new(30);
        let context = ExerciseContext::new(0.0, 0.033);
        let mut last = None;
        for down in [false, true, false] {
            last = Some(analyzer.analyze(&lunge_pose(down), &history, &context).unwrap());
        }
        let feedback = last.unwrap();
        assert_eq!(feedback.rep_count, 1);
        assert!(feedback.key_angles.contains_key("back_knee"));
    }
}
