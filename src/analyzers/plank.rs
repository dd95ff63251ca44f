use crate::analyzers::push_up::{support_pose_score, STRAIGHT_BODY_DEG};
use crate::analyzers::{
    angle_series, body_line_angle, clamp01, hip_deviation, spread, ExerciseContext, ExerciseDetector,
    HipDeviation,
};
use crate::errors::AnalysisError;
use crate::models::analysis::{ExerciseFeedback, ExerciseType, IssueSeverity, MovementIssue, MovementPhase};
use crate::models::body::Joint;
use crate::models::history::RingBuffer;
use crate::models::keypoint::{Keypoint, PoseFrame};
use crate::services::keypoint_processor::KeypointProcessor;

/// Frames of history needed before stillness counts for or against a plank
const MIN_STILLNESS_FRAMES: usize = 5;

#[derive(Debug, Clone)]
pub struct PlankAnalyzer {
    processor: KeypointProcessor,
    hold_duration_s: f64,
}

impl PlankAnalyzer {
    pub fn new(processor: KeypointProcessor) -> Self {
        Self {
            processor,
            hold_duration_s: 0.0,
        }
    }
}

impl ExerciseDetector for PlankAnalyzer {
    fn exercise_type(&self) -> ExerciseType {
        ExerciseType::Plank
    }

    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64 {
        let p = &self.processor;
        let Some(pose) = support_pose_score(p, keypoints) else {
            return 0.0;
        };
        if pose == 0.0 {
            return 0.0;
        }
        let stillness = if history.len() >= MIN_STILLNESS_FRAMES {
            let elbow_travel = spread(&angle_series(p, history, Joint::LeftElbow, Joint::RightElbow));
            1.0 - clamp01(elbow_travel / 25.0)
        } else {
            0.5
        };
        // Moving elbows mean reps, not a hold
        clamp01(pose * (0.4 + 0.6 * stillness) + 0.3 * stillness)
    }

    fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        _history: &RingBuffer<PoseFrame>,
        context: &ExerciseContext<'_>,
    ) -> Result<ExerciseFeedback, AnalysisError> {
        let p = self.processor;
        let line = body_line_angle(&p, keypoints).ok_or(AnalysisError::MissingKeypoints("body line"))?;

        let holding = line >= STRAIGHT_BODY_DEG;
        if holding && context.delta_time_s.is_finite() && context.delta_time_s > 0.0 {
            self.hold_duration_s += context.delta_time_s;
        }

        let phase = if holding { MovementPhase::Hold } else { MovementPhase::Neutral };
        let mut feedback = ExerciseFeedback::new(ExerciseType::Plank, phase, 0)
            .with_angle("body_line", Some(line))
            .with_angle(
                "elbow",
                p.bilateral_angle(keypoints, Joint::LeftElbow, Joint::RightElbow),
            );
        feedback.hold_duration_s = Some(self.hold_duration_s);

        if !holding {
            let issue = match hip_deviation(&p, keypoints)? {
                HipDeviation::Sag => MovementIssue::new(
                    IssueSeverity::Critical,
                    "hip_sag",
                    "Hips are sagging, squeeze glutes and brace your core",
                ),
                HipDeviation::Pike => MovementIssue::new(
                    IssueSeverity::Warning,
                    "hip_pike",
                    "Hips are too high, lower them to form a straight line",
                ),
            };
            feedback.flag(issue);
        }

        Ok(feedback)
    }

    fn reset(&mut self) {
        self.hold_duration_s = 0.0;
    }

    fn set_min_confidence(&mut self, min_confidence: f64) {
        self.processor = self.processor.with_min_confidence(min_confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keypoint::{CocoKeypoint, KEYPOINT_COUNT};

    fn plank_pose(hip_offset: f64) -> Vec<Keypoint> {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT];
        let mut set = |which: CocoKeypoint, x: f64, y: f64| kps[which.index()] = Keypoint::new(x, y, 0.9);
        set(CocoKeypoint::LeftShoulder, 200.0, 350.0);
        set(CocoKeypoint::LeftElbow, 200.0, 425.0);
        set(CocoKeypoint::LeftWrist, 200.0, 500.0);
        set(CocoKeypoint::LeftHip, 400.0, 415.0 + hip_offset);
        set(CocoKeypoint::LeftAnkle, 600.0, 480.0);
        kps
    }

    #[test]
    fn test_still_history_favours_plank() {
        let analyzer = PlankAnalyzer::new(KeypointProcessor::new());
        let mut history = RingBuffer::new(30);
        for i in 0..10 {
            history.push(PoseFrame::new(i as f64 * 33.0, plank_pose(0.0)));
        }
        assert!(analyzer.detect_exercise(&plank_pose(0.0), &history) >= 0.9);
    }

    #[test]
    fn test_moving_elbows_are_not_a_hold() {
        let analyzer = PlankAnalyzer::new(KeypointProcessor::new());
        let mut history = RingBuffer::new(30);
        for i in 0..10 {
            let mut kps = plank_pose(0.0);
            if i % 2 == 1 {
                kps[CocoKeypoint::LeftElbow.index()] = Keypoint::new(270.0, 400.0, 0.9);
            }
            history.push(PoseFrame::new(i as f64 * 33.0, kps));
        }
        assert!(analyzer.detect_exercise(&plank_pose(0.0), &history) < 0.3);
    }

    #[test]
    fn test_hold_duration_accumulates_only_with_good_form() {
        let mut analyzer = PlankAnalyzer::new(KeypointProcessor::new());
        let history = RingBuffer::new(30);
        let context = ExerciseContext::new(0.0, 0.5);

        analyzer.analyze(&plank_pose(0.0), &history, &context).unwrap();
        analyzer.analyze(&plank_pose(0.0), &history, &context).unwrap();
        let sagging = analyzer.analyze(&plank_pose(60.0), &history, &context).unwrap();

        assert_eq!(sagging.hold_duration_s, Some(1.0));
        assert_eq!(sagging.phase, MovementPhase::Neutral);
        assert_eq!(sagging.issues[0].severity, IssueSeverity::Critical);

        analyzer.reset();
        let fresh = analyzer.analyze(&plank_pose(0.0), &history, &ExerciseContext::new(0.0, 0.0)).unwrap();
        assert_eq!(fresh.hold_duration_s, Some(0.0));
    }
}
