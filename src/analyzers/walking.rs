use crate::analyzers::gait::{self, StepCounter};
use crate::analyzers::running::RUNNING_MIN_CADENCE;
use crate::analyzers::{ExerciseContext, ExerciseDetector};
use crate::errors::AnalysisError;
use crate::models::analysis::{ExerciseFeedback, ExerciseType, IssueSeverity, MovementIssue, MovementPhase};
use crate::models::history::RingBuffer;
use crate::models::keypoint::{CocoKeypoint, Keypoint, PoseFrame};
use crate::services::keypoint_processor::KeypointProcessor;

/// Slowest cadence (steps/min) still treated as walking
pub const WALKING_MIN_CADENCE: f64 = 60.0;
const SLOW_CADENCE: f64 = 80.0;
const MAX_LEAN_DEG: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct WalkingAnalyzer {
    processor: KeypointProcessor,
    steps: StepCounter,
}

impl WalkingAnalyzer {
    pub fn new(processor: KeypointProcessor) -> Self {
        Self {
            processor,
            steps: StepCounter::default(),
        }
    }
}

impl ExerciseDetector for WalkingAnalyzer {
    fn exercise_type(&self) -> ExerciseType {
        ExerciseType::Walking
    }

    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64 {
        let p = &self.processor;
        if !gait::is_upright(p, keypoints) {
            return 0.0;
        }
        match gait::window_cadence(p, history) {
            Some(cadence) if (WALKING_MIN_CADENCE..RUNNING_MIN_CADENCE).contains(&cadence) => {
                // Walking keeps the knees fairly straight
                match gait::min_knee_angle(p, history) {
                    Some(knee) if knee >= 140.0 => 0.8,
                    _ => 0.7,
                }
            }
            Some(cadence) if cadence >= RUNNING_MIN_CADENCE => 0.2,
            _ => 0.0,
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
        let cadence = gait::window_cadence(&p, history);
        let mut feedback = ExerciseFeedback::new(ExerciseType::Walking, MovementPhase::Stride, steps)
            .with_angle("torso_lean", lean);
        feedback.cadence_spm = cadence;

        if lean.is_some_and(|l| l.abs() > MAX_LEAN_DEG) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Minor,
                "posture",
                "Stand tall and keep your head over your shoulders",
            ));
        }
        if cadence.is_some_and(|c| c < SLOW_CADENCE) {
            feedback.flag(MovementIssue::new(
                IssueSeverity::Minor,
                "slow_cadence",
                "Take quicker, shorter steps",
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
