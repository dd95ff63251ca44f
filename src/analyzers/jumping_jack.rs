use crate::analyzers::{clamp01, ExerciseContext, ExerciseDetector};
use crate::errors::AnalysisError;
use crate::models::analysis::{ExerciseFeedback, ExerciseType, IssueSeverity, MovementIssue, MovementPhase};
use crate::models::history::RingBuffer;
use crate::models::keypoint::{CocoKeypoint, Keypoint, PoseFrame};
use crate::services::keypoint_processor::KeypointProcessor;

/// Ankle spread relative to hip width for open legs
const OPEN_STANCE_RATIO: f64 = 1.6;
/// Ankle spread relative to hip width for closed legs
const CLOSED_STANCE_RATIO: f64 = 1.3;
const MAX_UPRIGHT_LEAN_DEG: f64 = 30.0;
/// Repetition timestamps kept for the cadence estimate
const CADENCE_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JackPose {
    Open,
    Closed,
}

/// Arms and legs judged separately: `Some(true)` open, `Some(false)` closed
#[derive(Debug, Clone, Copy)]
struct Limbs {
    arms_up: Option<bool>,
    legs_open: Option<bool>,
}

impl Limbs {
    fn pose(&self) -> Option<JackPose> {
        match (self.arms_up?, self.legs_open?) {
            (true, true) => Some(JackPose::Open),
            (false, false) => Some(JackPose::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JumpingJackAnalyzer {
    processor: KeypointProcessor,
    last_pose: Option<JackPose>,
    opened: bool,
    rep_count: u32,
    rep_times_ms: RingBuffer<f64>,
}

impl JumpingJackAnalyzer {
    pub fn new(processor: KeypointProcessor) -> Self {
        Self {
            processor,
            last_pose: None,
            opened: false,
            rep_count: 0,
            rep_times_ms: RingBuffer::new(CADENCE_WINDOW),
        }
    }

    fn limbs(&self, keypoints: &[Keypoint]) -> Option<Limbs> {
        let p = &self.processor;
        let shoulder = p.shoulder_center(keypoints)?;
        let left_hip = p.point(keypoints, CocoKeypoint::LeftHip)?;
        let right_hip = p.point(keypoints, CocoKeypoint::RightHip)?;
        let hip_width = (left_hip.x - right_hip.x).abs();

        let arms_up = match (
            p.point(keypoints, CocoKeypoint::LeftWrist),
            p.point(keypoints, CocoKeypoint::RightWrist),
        ) {
            (Some(l), Some(r)) => Some(l.y < shoulder.y && r.y < shoulder.y),
            _ => None,
        };

        let legs_open = match (
            p.point(keypoints, CocoKeypoint::LeftAnkle),
            p.point(keypoints, CocoKeypoint::RightAnkle),
        ) {
            (Some(l), Some(r)) if hip_width > 0.0 => {
                let ratio = (l.x - r.x).abs() / hip_width;
                if ratio > OPEN_STANCE_RATIO {
                    Some(true)
                } else if ratio < CLOSED_STANCE_RATIO {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        };

        Some(Limbs { arms_up, legs_open })
    }

    fn is_upright(&self, keypoints: &[Keypoint]) -> bool {
        self.processor
            .trunk_lean(keypoints)
            .is_some_and(|lean| lean.abs() < MAX_UPRIGHT_LEAN_DEG)
    }

    fn cadence(&self) -> Option<f64> {
        let first = self.rep_times_ms.oldest()?;
        let last = self.rep_times_ms.latest()?;
        let span_s = (last - first) / 1000.0;
        (self.rep_times_ms.len() >= 2 && span_s > 0.0)
            .then(|| (self.rep_times_ms.len() - 1) as f64 / span_s * 60.0)
    }
}

impl ExerciseDetector for JumpingJackAnalyzer {
    fn exercise_type(&self) -> ExerciseType {
        ExerciseType::JumpingJack
    }

    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64 {
        if !self.is_upright(keypoints) {
            return 0.0;
        }

        let mut transitions = 0;
        let mut previous = None;
        for pose in history.iter().filter_map(|frame| self.limbs(&frame.keypoints)?.pose()) {
            if previous.is_some_and(|p| p != pose) {
                transitions += 1;
            }
            previous = Some(pose);
        }

        if transitions > 0 {
            return clamp01(0.15 + 0.2 * transitions as f64);
        }
        match self.limbs(keypoints).and_then(|l| l.pose()) {
            Some(JackPose::Open) => 0.35,
            Some(JackPose::Closed) => 0.05,
            None => 0.0,
        }
    }

    fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        _history: &RingBuffer<PoseFrame>,
        context: &ExerciseContext<'_>,
    ) -> Result<ExerciseFeedback, AnalysisError> {
        let limbs = self
            .limbs(keypoints)
            .ok_or(AnalysisError::MissingKeypoints("shoulders and hips"))?;

        match limbs.pose() {
            Some(JackPose::Open) => self.opened = true,
            Some(JackPose::Closed) if self.opened => {
                self.opened = false;
                self.rep_count += 1;
                self.rep_times_ms.push(context.timestamp_ms);
            }
            _ => {}
        }
        if let Some(pose) = limbs.pose() {
            self.last_pose = Some(pose);
        }

        let phase = match self.last_pose {
            Some(JackPose::Open) => MovementPhase::Open,
            Some(JackPose::Closed) => MovementPhase::Closed,
            None => MovementPhase::Neutral,
        };
        let mut feedback = ExerciseFeedback::new(ExerciseType::JumpingJack, phase, self.rep_count);
        feedback.cadence_spm = self.cadence();

        match (limbs.arms_up, limbs.legs_open) {
            (Some(false), Some(true)) => feedback.flag(MovementIssue::new(
                IssueSeverity::Minor,
                "arm_range",
                "Raise your arms fully overhead as your feet go out",
            )),
            (Some(true), Some(false)) => feedback.flag(MovementIssue::new(
                IssueSeverity::Minor,
                "leg_range",
                "Jump your feet wider as your arms go up",
            )),
            _ => {}
        }

        Ok(feedback)
    }

    fn reset(&mut self) {
        self.last_pose = None;
        self.opened = false;
        self.rep_count = 0;
        self.rep_times_ms.clear();
    }

    fn set_min_confidence(&mut self, min_confidence: f64) {
        self.processor = self.processor.with_min_confidence(min_confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keypoint::KEYPOINT_COUNT;

    fn jack_pose(open: bool) -> Vec<Keypoint> {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT];
        let mut set = |which: CocoKeypoint, x: f64, y: f64| kps[which.index()] = Keypoint::new(x, y, 0.9);
        set(CocoKeypoint::LeftShoulder, 280.0, 200.0);
        set(CocoKeypoint::RightShoulder, 360.0, 200.0);
        set(CocoKeypoint::LeftHip, 290.0, 400.0);
        set(CocoKeypoint::RightHip, 350.0, 400.0);
        if open {
            set(CocoKeypoint::LeftWrist, 220.0, 80.0);
            set(CocoKeypoint::RightWrist, 420.0, 80.0);
            set(CocoKeypoint::LeftAnkle, 230.0, 700.0);
            set(CocoKeypoint::RightAnkle, 410.0, 700.0);
        } else {
            set(CocoKeypoint::LeftWrist, 265.0, 400.0);
            set(CocoKeypoint::RightWrist, 375.0, 400.0);
            set(CocoKeypoint::LeftAnkle, 295.0, 700.0);
            set(CocoKeypoint::RightAnkle, 345.0, 700.0);
        }
        kps
    }

    #[test]
    fn test_alternation_in_history_is_detected() {
        let analyzer = JumpingJackAnalyzer::new(KeypointProcessor::new());
        let mut history = RingBuffer::new(30);
        for i in 0..8 {
            history.push(PoseFrame::new(i as f64 * 100.0, jack_pose(i % 2 == 0)));
        }
        assert!(analyzer.detect_exercise(&jack_pose(true), &history) >= 0.6);

        let standing = RingBuffer::new(30);
        assert!(analyzer.detect_exercise(&jack_pose(false), &standing) < 0.1);
    }

    #[test]
    fn test_counts_open_close_cycles_with_cadence() {
        let mut analyzer = JumpingJackAnalyzer::new(KeypointProcessor::new());
        let history = RingBuffer::new(30);
        let mut last = None;
        for i in 0..8 {
            let context = ExerciseContext::new(i as f64 * 500.0, 0.5);
            last = Some(analyzer.analyze(&jack_pose(i % 2 == 1), &history, &context).unwrap());
        }
        let feedback = last.unwrap();
        // Closed, open, closed, ... ends on open after three completed cycles
        assert_eq!(feedback.rep_count, 3);
        assert_eq!(feedback.phase, MovementPhase::Open);
        let cadence = feedback.cadence_spm.unwrap();
        assert!((cadence - 60.0).abs() < 1e-9);
    }
}
