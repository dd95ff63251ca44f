//! Exercise analyzers
//!
//! Each variant scores how likely the current pose is its exercise
//! (`detect_exercise`) and, once selected by the engine, turns frames into
//! phase, repetition and form feedback (`analyze`).

pub mod gait;
pub mod jumping_jack;
pub mod lunge;
pub mod plank;
pub mod push_up;
pub mod running;
pub mod squat;
pub mod walking;

pub use jumping_jack::JumpingJackAnalyzer;
pub use lunge::LungeAnalyzer;
pub use plank::PlankAnalyzer;
pub use push_up::PushUpAnalyzer;
pub use running::RunningAnalyzer;
pub use squat::SquatAnalyzer;
pub use walking::WalkingAnalyzer;

use crate::errors::AnalysisError;
use crate::models::analysis::{ExerciseFeedback, ExerciseType, MovementPhase};
use crate::models::body::Joint;
use crate::models::history::RingBuffer;
use crate::models::keypoint::{Keypoint, PoseFrame};
use crate::services::keypoint_processor::{angle_between, KeypointProcessor};
use crate::services::kinematics_tracker::KinematicsTracker;

/// Trunk lean (degrees from vertical) beyond which the body counts as horizontal
pub const HORIZONTAL_LEAN_DEG: f64 = 60.0;

/// Per-frame inputs beyond the keypoints and frame history
#[derive(Debug, Clone, Copy)]
pub struct ExerciseContext<'a> {
    pub timestamp_ms: f64,
    pub delta_time_s: f64,
    pub kinematics: Option<&'a KinematicsTracker>,
}

impl<'a> ExerciseContext<'a> {
    pub fn new(timestamp_ms: f64, delta_time_s: f64) -> Self {
        Self {
            timestamp_ms,
            delta_time_s,
            kinematics: None,
        }
    }

    pub fn with_kinematics(mut self, kinematics: &'a KinematicsTracker) -> Self {
        self.kinematics = Some(kinematics);
        self
    }
}

/// Capability set every exercise analyzer provides to the engine
pub trait ExerciseDetector {
    fn exercise_type(&self) -> ExerciseType;

    /// Likelihood in [0, 1] that `keypoints` (with recent `history`) show this exercise
    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64;

    /// Phase, repetitions and form for the current frame
    fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        history: &RingBuffer<PoseFrame>,
        context: &ExerciseContext<'_>,
    ) -> Result<ExerciseFeedback, AnalysisError>;

    /// Forget repetition and phase state
    fn reset(&mut self);

    fn set_min_confidence(&mut self, min_confidence: f64);
}

/// Closed set of analyzers the engine arbitrates between
#[derive(Debug, Clone)]
pub enum ExerciseAnalyzer {
    Squat(SquatAnalyzer),
    PushUp(PushUpAnalyzer),
    Plank(PlankAnalyzer),
    JumpingJack(JumpingJackAnalyzer),
    Lunge(LungeAnalyzer),
    Running(RunningAnalyzer),
    Walking(WalkingAnalyzer),
}

impl ExerciseAnalyzer {
    /// Analyzer for `exercise`; `None` for idle
    pub fn new(exercise: ExerciseType, processor: KeypointProcessor) -> Option<Self> {
        let analyzer = match exercise {
            ExerciseType::Idle => return None,
            ExerciseType::Squat => ExerciseAnalyzer::Squat(SquatAnalyzer::new(processor)),
            ExerciseType::PushUp => ExerciseAnalyzer::PushUp(PushUpAnalyzer::new(processor)),
            ExerciseType::Plank => ExerciseAnalyzer::Plank(PlankAnalyzer::new(processor)),
            ExerciseType::JumpingJack => ExerciseAnalyzer::JumpingJack(JumpingJackAnalyzer::new(processor)),
            ExerciseType::Lunge => ExerciseAnalyzer::Lunge(LungeAnalyzer::new(processor)),
            ExerciseType::Running => ExerciseAnalyzer::Running(RunningAnalyzer::new(processor)),
            ExerciseType::Walking => ExerciseAnalyzer::Walking(WalkingAnalyzer::new(processor)),
        };
        Some(analyzer)
    }

    /// One analyzer per exercise, in registration order
    pub fn all(processor: KeypointProcessor) -> Vec<Self> {
        [
            ExerciseType::Squat,
            ExerciseType::PushUp,
            ExerciseType::Plank,
            ExerciseType::JumpingJack,
            ExerciseType::Lunge,
            ExerciseType::Running,
            ExerciseType::Walking,
        ]
        .into_iter()
        .filter_map(|exercise| Self::new(exercise, processor))
        .collect()
    }
}

impl ExerciseDetector for ExerciseAnalyzer {
    fn exercise_type(&self) -> ExerciseType {
        match self {
            ExerciseAnalyzer::Squat(a) => a.exercise_type(),
            ExerciseAnalyzer::PushUp(a) => a.exercise_type(),
            ExerciseAnalyzer::Plank(a) => a.exercise_type(),
            ExerciseAnalyzer::JumpingJack(a) => a.exercise_type(),
            ExerciseAnalyzer::Lunge(a) => a.exercise_type(),
            ExerciseAnalyzer::Running(a) => a.exercise_type(),
            ExerciseAnalyzer::Walking(a) => a.exercise_type(),
        }
    }

    fn detect_exercise(&self, keypoints: &[Keypoint], history: &RingBuffer<PoseFrame>) -> f64 {
        let confidence = match self {
            ExerciseAnalyzer::Squat(a) => a.detect_exercise(keypoints, history),
            ExerciseAnalyzer::PushUp(a) => a.detect_exercise(keypoints, history),
            ExerciseAnalyzer::Plank(a) => a.detect_exercise(keypoints, history),
            ExerciseAnalyzer::JumpingJack(a) => a.detect_exercise(keypoints, history),
            ExerciseAnalyzer::Lunge(a) => a.detect_exercise(keypoints, history),
            ExerciseAnalyzer::Running(a) => a.detect_exercise(keypoints, history),
            ExerciseAnalyzer::Walking(a) => a.detect_exercise(keypoints, history),
        };
        if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        history: &RingBuffer<PoseFrame>,
        context: &ExerciseContext<'_>,
    ) -> Result<ExerciseFeedback, AnalysisError> {
        match self {
            ExerciseAnalyzer::Squat(a) => a.analyze(keypoints, history, context),
            ExerciseAnalyzer::PushUp(a) => a.analyze(keypoints, history, context),
            ExerciseAnalyzer::Plank(a) => a.analyze(keypoints, history, context),
            ExerciseAnalyzer::JumpingJack(a) => a.analyze(keypoints, history, context),
            ExerciseAnalyzer::Lunge(a) => a.analyze(keypoints, history, context),
            ExerciseAnalyzer::Running(a) => a.analyze(keypoints, history, context),
            ExerciseAnalyzer::Walking(a) => a.analyze(keypoints, history, context),
        }
    }

    fn reset(&mut self) {
        match self {
            ExerciseAnalyzer::Squat(a) => a.reset(),
            ExerciseAnalyzer::PushUp(a) => a.reset(),
            ExerciseAnalyzer::Plank(a) => a.reset(),
            ExerciseAnalyzer::JumpingJack(a) => a.reset(),
            ExerciseAnalyzer::Lunge(a) => a.reset(),
            ExerciseAnalyzer::Running(a) => a.reset(),
            ExerciseAnalyzer::Walking(a) => a.reset(),
        }
    }

    fn set_min_confidence(&mut self, min_confidence: f64) {
        match self {
            ExerciseAnalyzer::Squat(a) => a.set_min_confidence(min_confidence),
            ExerciseAnalyzer::PushUp(a) => a.set_min_confidence(min_confidence),
            ExerciseAnalyzer::Plank(a) => a.set_min_confidence(min_confidence),
            ExerciseAnalyzer::JumpingJack(a) => a.set_min_confidence(min_confidence),
            ExerciseAnalyzer::Lunge(a) => a.set_min_confidence(min_confidence),
            ExerciseAnalyzer::Running(a) => a.set_min_confidence(min_confidence),
            ExerciseAnalyzer::Walking(a) => a.set_min_confidence(min_confidence),
        }
    }
}

/// Hysteresis repetition counter driven by a single joint angle.
///
/// A repetition is counted when the angle returns above `extended_deg`
/// after having dropped below `flexed_deg`.
#[derive(Debug, Clone)]
pub struct RepCounter {
    flexed_deg: f64,
    extended_deg: f64,
    phase: MovementPhase,
    reached_bottom: bool,
    count: u32,
    last_angle: Option<f64>,
    /// Smallest angle seen in the repetition in progress
    deepest: Option<f64>,
}

/// What happened to the counter on one update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepUpdate {
    pub phase: MovementPhase,
    /// Set on the frame a repetition completes, with its deepest angle
    pub completed: Option<f64>,
}

impl RepCounter {
    pub fn new(flexed_deg: f64, extended_deg: f64) -> Self {
        Self {
            flexed_deg,
            extended_deg,
            phase: MovementPhase::Neutral,
            reached_bottom: false,
            count: 0,
            last_angle: None,
            deepest: None,
        }
    }

    pub fn update(&mut self, angle: f64) -> RepUpdate {
        let mut completed = None;
        self.deepest = Some(self.deepest.map_or(angle, |d| d.min(angle)));

        self.phase = if angle >= self.extended_deg {
            if self.reached_bottom {
                self.count += 1;
                self.reached_bottom = false;
                completed = self.deepest;
            }
            self.deepest = None;
            MovementPhase::Top
        } else if angle <= self.flexed_deg {
            self.reached_bottom = true;
            MovementPhase::Bottom
        } else {
            match self.last_angle {
                Some(last) if angle < last => MovementPhase::Descending,
                Some(last) if angle > last => MovementPhase::Ascending,
                _ => self.phase,
            }
        };
        self.last_angle = Some(angle);

        RepUpdate {
            phase: self.phase,
            completed,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn phase(&self) -> MovementPhase {
        self.phase
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.flexed_deg, self.extended_deg);
    }
}

pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Bilateral angle of a joint pair across the frame history, oldest first
pub(crate) fn angle_series(
    processor: &KeypointProcessor,
    history: &RingBuffer<PoseFrame>,
    left: Joint,
    right: Joint,
) -> Vec<f64> {
    history
        .iter()
        .filter_map(|frame| processor.bilateral_angle(&frame.keypoints, left, right))
        .collect()
}

/// Max minus min, zero for fewer than two values
pub(crate) fn spread(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    max - min
}

/// 1 when the trunk is closer to horizontal than vertical, 0 otherwise, `None` if unknown
pub(crate) fn horizontal_score(processor: &KeypointProcessor, keypoints: &[Keypoint]) -> Option<f64> {
    let lean = processor.trunk_lean(keypoints)?.abs();
    Some(if lean >= HORIZONTAL_LEAN_DEG && lean <= 180.0 - HORIZONTAL_LEAN_DEG / 2.0 {
        1.0
    } else {
        0.0
    })
}

/// Shoulder-hip-ankle angle; 180 for a perfectly straight body
pub(crate) fn body_line_angle(processor: &KeypointProcessor, keypoints: &[Keypoint]) -> Option<f64> {
    Some(angle_between(
        processor.shoulder_center(keypoints)?,
        processor.hip_center(keypoints)?,
        processor.ankle_center(keypoints)?,
    ))
}

/// Whether the hips sit below (sag) or above (pike) the shoulder-ankle line
pub(crate) fn hip_deviation(
    processor: &KeypointProcessor,
    keypoints: &[Keypoint],
) -> Result<HipDeviation, AnalysisError> {
    let shoulder = processor
        .shoulder_center(keypoints)
        .ok_or(AnalysisError::MissingKeypoints("body line"))?;
    let hip = processor
        .hip_center(keypoints)
        .ok_or(AnalysisError::MissingKeypoints("body line"))?;
    let ankle = processor
        .ankle_center(keypoints)
        .ok_or(AnalysisError::MissingKeypoints("body line"))?;

    let run = ankle.x - shoulder.x;
    if run.abs() < f64::EPSILON {
        return Err(AnalysisError::DegenerateGeometry("body line"));
    }
    let line_y = shoulder.y + (hip.x - shoulder.x) / run * (ankle.y - shoulder.y);
    // Image y grows downwards
    Ok(if hip.y > line_y { HipDeviation::Sag } else { HipDeviation::Pike })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HipDeviation {
    Sag,
    Pike,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rep_counter_hysteresis() {
        let mut counter = RepCounter::new(100.0, 160.0);
        let mut completed = Vec::new();
        for angle in [170.0, 140.0, 95.0, 90.0, 120.0, 150.0, 165.0, 130.0, 165.0] {
            if let Some(depth) = counter.update(angle).completed {
                completed.push(depth);
            }
        }
        // The dip to 130 never crosses the flexed threshold
        assert_eq!(counter.count(), 1);
        assert_eq!(completed, vec![90.0]);
        assert_eq!(counter.phase(), MovementPhase::Top);
    }

    #[test]
    fn test_rep_counter_phases() {
        let mut counter = RepCounter::new(100.0, 160.0);
        assert_eq!(counter.update(170.0).phase, MovementPhase::Top);
        assert_eq!(counter.update(140.0).phase, MovementPhase::Descending);
        assert_eq!(counter.update(90.0).phase, MovementPhase::Bottom);
        assert_eq!(counter.update(120.0).phase, MovementPhase::Ascending);
        counter.reset();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.phase(), MovementPhase::Neutral);
    }

    #[test]
    fn test_registry_covers_every_exercise() {
        let analyzers = ExerciseAnalyzer::all(KeypointProcessor::new());
        let types: Vec<_> = analyzers.iter().map(|a| a.exercise_type()).collect();
        assert_eq!(types.len(), 7);
        assert!(!types.contains(&ExerciseType::Idle));
        assert!(ExerciseAnalyzer::new(ExerciseType::Idle, KeypointProcessor::new()).is_none());
    }

    #[test]
    fn test_spread() {
        assert_eq!(spread(&[]), 0.0);
        assert_eq!(spread(&[3.0]), 0.0);
        assert_eq!(spread(&[3.0, 9.0, 1.0]), 8.0);
    }
}
