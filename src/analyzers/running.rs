use crate::analyzers::gait::{self, StepCounter};
use crate::analyzers::{clamp01, ExerciseContext, ExerciseDetector};
use crate::errors::AnalysisError;
use crate::models::analysis::{ExerciseFeedback, ExerciseType, IssueSeverity, MovementIssue, MovementPhase};
use crate::models::history::RingBuffer;
use crate::models::keypoint::{CocoKeypoint, Keypoint, PoseFrame};
use crate::services::keypoint_processor::KeypointProcessor;

/// Cadence (steps/min) from which a gait counts as running
pub const RUNNING_MIN_CADENCE: f64 = 140.0;

const MAX_LEAN_DEG: f64 = 25.0;
/// Foot landing further ahead of the hips than this many torso lengths
const OVERSTRIDE_RATIO: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct RunningAnalyzer {
    processor: KeypointProcessor,
    steps: StepCounter,
}

impl RunningAnalyzer {
    pub fn new(processor: KeypointProcessor) -> Self {
        Self {
            processor,
            steps: StepCounter::default(),
        }
    }

    fn overstriding(&self, keypoints: &[Keypoint]) -> bool {
        let p = &self.processor;
        let (Some(hip), Some(torso)) = (p.hip_center(keypoints), p.torso_length(keypoints)) else {
            return false;
        };
        [CocoKeypoint::LeftAnkle, CocoKeypoint::RightAnkle]
            .iter()
            .filter_map(|which| p.point(keypoints, *which))
            .any(|ankle| (ankle.x - hip.x).abs() > OVERSTRIDE_RATIO * torso)
    }
}

impl ExerciseDetector for RunningAnalyzer {
    fn exercise_type(&self) -> ExerciseType {
        ExerciseType::Running
    }

    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64 {
        let p = &self.processor;
        if !gait::is_upright(p, keypoints) {
            return 0.0;
        }
        let Some(cadence) = gait::window_cadence(p, history) else {
            return 0.0;
        };

        if cadence >= RUNNING_MIN_CADENCE {
            let flexion_bonus = match gait::min_knee_angle(p, history) {
                Some(knee) if knee < 140.0 => 0.1,
                _ => 0.0,
            };
            clamp01(0.6 + (cadence - RUNNING_MIN_CADENCE) / 100.0 + flexion_bonus)
        } else if cadence >= RUNNING_MIN_CADENCE - 20.0 {
            0.3
        } else {
            0.0
        }
    }

    fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        history: &RingBuffer<PoseFrame>,
        _context: &ExerciseContext<'_>,
    ) -> Result<ExerciseFeedback, AnalysisError> {
        let p = self.processor;
        if p.point(keypoints, CocoKeypoint::LeftAnkle).is_none() && p.point(keypoints, CocoKeypoint::RightAnkle).is_none() {
            return Err(AnalysisError::MissingKeypoints("ankles"));
        }

        let steps = self.steps.update(&p, keypoints);
        let lean = p.trunk_lean(keypoints);
        let mut feedback = ExerciseFeedback::new(ExerciseType::Running, MovementPhase::Stride, steps)
            .with_angle("torso_lean", lean)
            .with_angle("min_knee", gait::min_knee_angle(&p, history));
        feedback.cadence_spm = gait::window_cadence(&p, history);

        if lean.is_some_and(|l| l.abs() > MAX_LEAN_DEG) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Warning,
                "excessive_lean",
                "Run taller, lean slightly from the ankles rather than the waist",
            ));
        }
        if self.overstriding(keypoints) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Minor,
                "overstriding",
                "Land with your feet closer beneath your hips",
            ));
        }

        Ok(feedback)
    }

    fn reset(&mut self) {
        self.steps.reset();
    }

    fn set_min_confidence(&mut self, min_confidence: f64) {
        self.processor = self.processor.with_min_confidence(min_confidence);
    }
}
