use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::biomechanics::{BiomechanicsReport, EnergyEstimate, PowerStatistics};
use crate::models::keypoint::Keypoint;

/// Exercise types recognised by the analyzer set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Idle,
    Squat,
    #[serde(rename = "push-up")]
    PushUp,
    Plank,
    #[serde(rename = "jumping-jack")]
    JumpingJack,
    Lunge,
    Running,
    Walking,
}

impl ExerciseType {
    pub fn name(&self) -> &'static str {
        match self {
            ExerciseType::Idle => "idle",
            ExerciseType::Squat => "squat",
            ExerciseType::PushUp => "push-up",
            ExerciseType::Plank => "plank",
            ExerciseType::JumpingJack => "jumping-jack",
            ExerciseType::Lunge => "lunge",
            ExerciseType::Running => "running",
            ExerciseType::Walking => "walking",
        }
    }

    /// Reference power per kilogram of body mass (W/kg) for efficiency scoring
    pub fn optimal_power_per_kg(&self) -> f64 {
        match self {
            ExerciseType::Idle => 1.0,
            ExerciseType::Squat => 2.0,
            ExerciseType::PushUp => 1.5,
            ExerciseType::Plank => 0.5,
            ExerciseType::JumpingJack => 3.0,
            ExerciseType::Lunge => 2.0,
            ExerciseType::Running => 4.0,
            ExerciseType::Walking => 1.5,
        }
    }
}

impl std::fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Phase of the current repetition or movement cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPhase {
    #[default]
    Neutral,
    Top,
    Descending,
    Bottom,
    Ascending,
    Hold,
    Open,
    Closed,
    Stride,
}

/// Severity level of detected issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Critical,
    Warning,
    Minor,
}

/// Form issue detected by an exercise analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementIssue {
    pub severity: IssueSeverity,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub description: String,
}

impl MovementIssue {
    pub fn new(severity: IssueSeverity, issue_type: &str, description: &str) -> Self {
        Self {
            severity,
            issue_type: issue_type.to_string(),
            description: description.to_string(),
        }
    }

    /// Score deduction applied to the form score
    pub fn penalty(&self) -> f64 {
        match self.severity {
            IssueSeverity::Critical => 30.0,
            IssueSeverity::Warning => 15.0,
            IssueSeverity::Minor => 5.0,
        }
    }
}

/// Per-frame output of the active exercise analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseFeedback {
    pub exercise_type: ExerciseType,
    pub phase: MovementPhase,
    pub rep_count: u32,
    /// 0-100
    pub form_score: f64,
    pub key_angles: BTreeMap<String, f64>,
    pub issues: Vec<MovementIssue>,
    pub hold_duration_s: Option<f64>,
    pub cadence_spm: Option<f64>,
}

impl ExerciseFeedback {
    pub fn new(exercise_type: ExerciseType, phase: MovementPhase, rep_count: u32) -> Self {
        Self {
            exercise_type,
            phase,
            rep_count,
            form_score: 100.0,
            key_angles: BTreeMap::new(),
            issues: Vec::new(),
            hold_duration_s: None,
            cadence_spm: None,
        }
    }

    /// Record an issue and deduct it from the form score
    pub fn flag(&mut self, issue: MovementIssue) {
        self.form_score = (self.form_score - issue.penalty()).max(0.0);
        self.issues.push(issue);
    }

    pub fn with_angle(mut self, name: &str, value: Option<f64>) -> Self {
        if let Some(value) = value {
            self.key_angles.insert(name.to_string(), value);
        }
        self
    }
}

/// Coarse label for a keypoint's recent trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionPattern {
    Static,
    Linear,
    Oscillatory,
    Irregular,
}

/// Whole-body kinematics summary for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSummary {
    /// Mean speed of tracked keypoints (px/s)
    pub average_speed: f64,
    /// Highest current speed among tracked keypoints (px/s)
    pub peak_speed: f64,
    pub dominant_pattern: Option<MotionPattern>,
    /// Mean jerk-based smoothness across keypoints, lower is smoother
    pub smoothness: Option<f64>,
}

/// The per-frame output aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub timestamp_ms: f64,
    pub exercise_type: ExerciseType,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<MovementPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rep_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_duration_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadence_spm: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<MovementIssue>,
    #[serde(flatten)]
    pub biomechanics: BiomechanicsReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    pub recommendations: Vec<String>,
    /// Set when the active analyzer failed on this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Smoothed keypoints for this frame
    pub keypoints: Vec<Keypoint>,
}

impl AnalysisResult {
    /// Result with no detected activity
    pub fn idle(timestamp_ms: f64, keypoints: Vec<Keypoint>) -> Self {
        Self {
            timestamp_ms,
            exercise_type: ExerciseType::Idle,
            confidence: 0.0,
            phase: None,
            rep_count: None,
            form_score: None,
            hold_duration_s: None,
            cadence_spm: None,
            issues: Vec::new(),
            biomechanics: BiomechanicsReport::default(),
            motion: None,
            overall_score: None,
            recommendations: Vec::new(),
            error: None,
            keypoints,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.exercise_type == ExerciseType::Idle
    }

    /// Copy the analyzer's feedback into the result
    pub fn apply_feedback(&mut self, feedback: ExerciseFeedback) {
        self.phase = Some(feedback.phase);
        self.rep_count = Some(feedback.rep_count);
        self.form_score = Some(feedback.form_score);
        self.hold_duration_s = feedback.hold_duration_s;
        self.cadence_spm = feedback.cadence_spm;
        self.issues = feedback.issues;
    }
}

/// Lightweight record of a processed frame kept for session statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResultSummary {
    pub timestamp_ms: f64,
    pub exercise_type: ExerciseType,
    pub confidence: f64,
    pub overall_score: Option<f64>,
    pub rep_count: Option<u32>,
}

impl From<&AnalysisResult> for ResultSummary {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            timestamp_ms: result.timestamp_ms,
            exercise_type: result.exercise_type,
            confidence: result.confidence,
            overall_score: result.overall_score,
            rep_count: result.rep_count,
        }
    }
}

/// Aggregates over the rolling analysis history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatistics {
    pub frames_processed: u64,
    /// Frames in the rolling history with a detected exercise
    pub active_frames: usize,
    pub average_confidence: Option<f64>,
    pub average_score: Option<f64>,
    pub exercise_frames: BTreeMap<ExerciseType, usize>,
    /// Highest repetition count seen per exercise in the rolling history
    pub reps: BTreeMap<ExerciseType, u32>,
    pub current_exercise: ExerciseType,
    pub energy: EnergyEstimate,
    pub power: PowerStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_type_serialization() {
        assert_eq!(serde_json::to_string(&ExerciseType::PushUp).unwrap(), "\"push-up\"");
        assert_eq!(serde_json::to_string(&ExerciseType::JumpingJack).unwrap(), "\"jumping-jack\"");
        assert_eq!(serde_json::to_string(&ExerciseType::Idle).unwrap(), "\"idle\"");
        let parsed: ExerciseType = serde_json::from_str("\"lunge\"").unwrap();
        assert_eq!(parsed, ExerciseType::Lunge);
    }

    #[test]
    fn test_feedback_flag_deducts_score() {
        let mut feedback = ExerciseFeedback::new(ExerciseType::Squat, MovementPhase::Bottom, 2);
        feedback.flag(MovementIssue::new(IssueSeverity::Warning, "depth", "Go deeper"));
        feedback.flag(MovementIssue::new(IssueSeverity::Critical, "knees", "Knees caving"));
        assert_eq!(feedback.form_score, 55.0);
        assert_eq!(feedback.issues.len(), 2);
    }

    #[test]
    fn test_idle_result_contract() {
        let result = AnalysisResult::idle(10.0, Vec::new());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exercise_type"], "idle");
        assert_eq!(json["confidence"], 0.0);
        assert!(json.get("phase").is_none());
    }
}
