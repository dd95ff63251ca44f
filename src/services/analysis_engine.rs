use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::analyzers::{ExerciseAnalyzer, ExerciseContext, ExerciseDetector};
use crate::config::{ConfigUpdate, EngineConfig, FilterParameterUpdate};
use crate::errors::MotionError;
use crate::models::analysis::{
    AnalysisResult, ExerciseType, ResultSummary, SessionStatistics,
};
use crate::models::biomechanics::{BiomechanicsReport, RiskLevel};
use crate::models::body::AnthropometricModel;
use crate::models::history::RingBuffer;
use crate::models::keypoint::{Keypoint, PoseFrame, KEYPOINT_COUNT};
use crate::services::biomechanics_service::BiomechanicsEngine;
use crate::services::filter_bank::FilterBank;
use crate::services::keypoint_processor::KeypointProcessor;
use crate::services::kinematics_tracker::KinematicsTracker;

/// Results kept for session statistics
pub const ANALYSIS_HISTORY_CAP: usize = 300;
/// Weight of the newest detection in the reported confidence
pub const CONFIDENCE_SMOOTHING: f64 = 0.3;
pub const MAX_RECOMMENDATIONS: usize = 5;

const FORM_WEIGHT: f64 = 0.4;
const SYMMETRY_WEIGHT: f64 = 0.2;
const POSTURE_WEIGHT: f64 = 0.2;
const EFFICIENCY_WEIGHT: f64 = 0.2;
const LOW_SYMMETRY_SCORE: f64 = 80.0;
const LOW_EFFICIENCY: f64 = 0.5;

/// Classification state; mutated only by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    /// Index of the active analyzer, `None` while idle
    pub current: Option<usize>,
    pub last_switch_ms: Option<f64>,
    /// Smoothed detection confidence of the active analyzer
    pub confidence: f64,
}

/// Frame-by-frame orchestrator: filter -> kinematics -> classification/analysis -> biomechanics
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    config: EngineConfig,
    filter_bank: FilterBank,
    kinematics: KinematicsTracker,
    biomechanics: BiomechanicsEngine,
    analyzers: Vec<ExerciseAnalyzer>,
    state: EngineState,
    frame_history: RingBuffer<PoseFrame>,
    result_history: RingBuffer<ResultSummary>,
    frames_processed: u64,
    last_timestamp_ms: Option<f64>,
}

impl AnalysisEngine {
    /// Create an engine after validating `config`
    pub fn new(config: EngineConfig) -> Result<Self, MotionError> {
        config.validate()?;
        Ok(Self::build(config, AnthropometricModel::default()))
    }

    /// Create an engine for a specific body
    pub fn with_body(config: EngineConfig, body: AnthropometricModel) -> Result<Self, MotionError> {
        config.validate()?;
        Ok(Self::build(config, body))
    }

    fn build(config: EngineConfig, body: AnthropometricModel) -> Self {
        let min_confidence = config.min_keypoint_confidence;
        let processor = KeypointProcessor::new().with_min_confidence(min_confidence);

        let mut filter_bank = FilterBank::with_parameters(config.filter)
            .unwrap_or_else(|e| {
                warn!("Falling back to default filter parameters: {}", e);
                FilterBank::new()
            })
            .with_min_confidence(min_confidence);
        filter_bank.set_enabled(config.enable_filtering);

        Self {
            filter_bank,
            kinematics: KinematicsTracker::new(config.max_history_length).with_min_confidence(min_confidence),
            biomechanics: BiomechanicsEngine::new(body).with_min_confidence(min_confidence),
            analyzers: ExerciseAnalyzer::all(processor),
            state: EngineState::default(),
            frame_history: RingBuffer::new(config.max_history_length),
            result_history: RingBuffer::new(ANALYSIS_HISTORY_CAP),
            frames_processed: 0,
            last_timestamp_ms: None,
            config,
        }
    }

    /// Run one frame through the whole pipeline.
    ///
    /// `delta_time_s` is the frame-to-frame time in seconds; when it is not
    /// positive the timestamp difference is used instead. Never fails: missing
    /// data is omitted from the result and analyzer failures are reported in
    /// `AnalysisResult::error`.
    pub fn process_frame(&mut self, keypoints: &[Keypoint], timestamp_ms: f64, delta_time_s: f64) -> AnalysisResult {
        if let Some(last) = self.last_timestamp_ms {
            if timestamp_ms <= last {
                warn!("Non-monotonic frame timestamp {} after {}", timestamp_ms, last);
            }
        }
        let dt = self.frame_delta(timestamp_ms, delta_time_s);
        self.last_timestamp_ms = Some(timestamp_ms);
        self.frames_processed += 1;

        let mut raw = keypoints.to_vec();
        raw.resize(KEYPOINT_COUNT, Keypoint::new(0.0, 0.0, 0.0));
        let filtered = self.filter_bank.filter_frame(&raw, timestamp_ms);

        if self.config.enable_kinematics {
            self.kinematics.update(&filtered, timestamp_ms, dt);
        }
        self.frame_history.push(PoseFrame::new(timestamp_ms, filtered.clone()));

        self.update_classification(&filtered, timestamp_ms);

        let result = match self.state.current {
            None => self.idle_result(&filtered, timestamp_ms, dt),
            Some(index) => self.active_result(index, &filtered, timestamp_ms, dt),
        };

        self.result_history.push(ResultSummary::from(&result));
        result
    }

    fn frame_delta(&self, timestamp_ms: f64, delta_time_s: f64) -> f64 {
        if delta_time_s.is_finite() && delta_time_s > 0.0 {
            return delta_time_s;
        }
        match self.last_timestamp_ms {
            Some(last) if timestamp_ms > last => (timestamp_ms - last) / 1000.0,
            _ => 0.0,
        }
    }

    fn run_biomechanics(&mut self, keypoints: &[Keypoint], dt: f64, exercise: ExerciseType) -> BiomechanicsReport {
        if !self.config.enable_biomechanics {
            return BiomechanicsReport::default();
        }
        let kinematics = self.config.enable_kinematics.then_some(&self.kinematics);
        self.biomechanics.analyze(keypoints, dt, exercise, kinematics)
    }

    fn idle_result(&mut self, keypoints: &[Keypoint], timestamp_ms: f64, dt: f64) -> AnalysisResult {
        let mut result = AnalysisResult::idle(timestamp_ms, keypoints.to_vec());
        result.biomechanics = self.run_biomechanics(keypoints, dt, ExerciseType::Idle);
        if self.config.enable_kinematics {
            result.motion = self.kinematics.summary();
        }
        result
    }

    fn active_result(&mut self, index: usize, keypoints: &[Keypoint], timestamp_ms: f64, dt: f64) -> AnalysisResult {
        let exercise = self.analyzers[index].exercise_type();
        let mut result = AnalysisResult::idle(timestamp_ms, keypoints.to_vec());
        result.exercise_type = exercise;
        result.confidence = self.state.confidence;

        let analysis = {
            let mut context = ExerciseContext::new(timestamp_ms, dt);
            if self.config.enable_kinematics {
                context = context.with_kinematics(&self.kinematics);
            }
            self.analyzers[index].analyze(keypoints, &self.frame_history, &context)
        };

        match analysis {
            Ok(feedback) => {
                result.apply_feedback(feedback);
                // Only successful frames feed the session power and energy totals
                result.biomechanics = self.run_biomechanics(keypoints, dt, exercise);
                if self.config.enable_kinematics {
                    result.motion = self.kinematics.summary();
                }
                result.overall_score = overall_score(&result);
                result.recommendations = recommendations(&result);
            }
            Err(e) => {
                warn!("{} analysis failed at {} ms: {}", exercise, timestamp_ms, e);
                result.error = Some(e.to_string());
            }
        }
        result
    }

    /// Advance the Idle/Active state machine for this frame
    fn update_classification(&mut self, keypoints: &[Keypoint], timestamp_ms: f64) {
        let threshold = self.config.confidence_threshold;

        if let Some(current) = self.state.current {
            let own = self.analyzers[current].detect_exercise(keypoints, &self.frame_history);
            if own >= threshold / 2.0 {
                self.smooth_confidence(own);
                return;
            }

            let ranking = self.rank(keypoints);
            let Some(&(best, best_confidence)) = ranking.first() else {
                return;
            };
            let cooled = self.cooldown_elapsed(timestamp_ms);
            if best != current && best_confidence >= threshold && cooled {
                self.switch_to(best, best_confidence, timestamp_ms);
            } else if best_confidence < self.config.idle_confidence_floor && cooled {
                self.fall_back_to_idle(timestamp_ms);
            } else {
                self.smooth_confidence(own);
            }
            return;
        }

        let ranking = self.rank(keypoints);
        if let Some(&(best, best_confidence)) = ranking.first() {
            if best_confidence >= threshold && self.cooldown_elapsed(timestamp_ms) {
                self.switch_to(best, best_confidence, timestamp_ms);
            }
        }
    }

    /// Every analyzer's detection confidence, highest first
    fn rank(&self, keypoints: &[Keypoint]) -> Vec<(usize, f64)> {
        let mut ranking: Vec<(usize, f64)> = self
            .analyzers
            .iter()
            .enumerate()
            .map(|(i, analyzer)| (i, analyzer.detect_exercise(keypoints, &self.frame_history)))
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));

        debug!(
            "Detection ranking: {:?}",
            ranking
                .iter()
                .map(|(i, c)| (self.analyzers[*i].exercise_type().name(), *c))
                .collect::<Vec<_>>()
        );
        ranking
    }

    fn cooldown_elapsed(&self, timestamp_ms: f64) -> bool {
        match self.state.last_switch_ms {
            Some(last) => timestamp_ms - last >= self.config.switch_cooldown_ms as f64,
            None => true,
        }
    }

    fn switch_to(&mut self, index: usize, confidence: f64, timestamp_ms: f64) {
        let previous = self.current_exercise();
        self.analyzers[index].reset();
        self.kinematics.reset();
        self.state = EngineState {
            current: Some(index),
            last_switch_ms: Some(timestamp_ms),
            confidence,
        };
        info!(
            "Exercise switched: {} -> {} (confidence {:.2})",
            previous,
            self.analyzers[index].exercise_type(),
            confidence
        );
    }

    fn fall_back_to_idle(&mut self, timestamp_ms: f64) {
        info!("Exercise {} ended, returning to idle", self.current_exercise());
        self.state = EngineState {
            current: None,
            last_switch_ms: Some(timestamp_ms),
            confidence: 0.0,
        };
    }

    fn smooth_confidence(&mut self, detection: f64) {
        self.state.confidence =
            (1.0 - CONFIDENCE_SMOOTHING) * self.state.confidence + CONFIDENCE_SMOOTHING * detection;
    }

    /// Merge, validate and apply a configuration change; on error nothing changes
    pub fn update_config(&mut self, update: &ConfigUpdate) -> Result<(), MotionError> {
        let merged = self.config.merged(update);
        merged.validate()?;

        if merged.max_history_length != self.config.max_history_length {
            self.frame_history.set_capacity(merged.max_history_length);
            self.kinematics.set_window(merged.max_history_length);
        }
        if merged.enable_filtering != self.config.enable_filtering {
            self.filter_bank.set_enabled(merged.enable_filtering);
        }
        if merged.min_keypoint_confidence != self.config.min_keypoint_confidence {
            let min_confidence = merged.min_keypoint_confidence;
            self.filter_bank.set_min_confidence(min_confidence);
            self.kinematics.set_min_confidence(min_confidence);
            self.biomechanics.set_min_confidence(min_confidence);
            for analyzer in &mut self.analyzers {
                analyzer.set_min_confidence(min_confidence);
            }
        }

        info!("Engine configuration updated: {:?}", update);
        self.config = merged;
        Ok(())
    }

    /// Validate and apply filter parameters; returns whether they changed
    pub fn update_filter_parameters(&mut self, update: &FilterParameterUpdate) -> Result<bool, MotionError> {
        let changed = self.filter_bank.update_parameters(update)?;
        if changed {
            self.config.filter = *self.filter_bank.parameters();
            info!("Filter parameters updated: {:?}", self.config.filter);
        }
        Ok(changed)
    }

    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.config.enable_filtering = enabled;
        self.filter_bank.set_enabled(enabled);
    }

    /// Set the user's height (m) and mass (kg) for all mass/length-dependent quantities
    pub fn set_body_parameters(&mut self, height_m: f64, mass_kg: f64) -> Result<(), MotionError> {
        self.biomechanics.set_body_parameters(height_m, mass_kg)
    }

    /// Aggregates over the rolling analysis history
    pub fn statistics(&self) -> SessionStatistics {
        let active: Vec<&ResultSummary> = self
            .result_history
            .iter()
            .filter(|r| r.exercise_type != ExerciseType::Idle)
            .collect();

        let mut exercise_frames: BTreeMap<ExerciseType, usize> = BTreeMap::new();
        let mut reps: BTreeMap<ExerciseType, u32> = BTreeMap::new();
        for summary in &active {
            *exercise_frames.entry(summary.exercise_type).or_default() += 1;
            if let Some(count) = summary.rep_count {
                let best = reps.entry(summary.exercise_type).or_default();
                *best = (*best).max(count);
            }
        }

        let confidences: Vec<f64> = active.iter().map(|r| r.confidence).collect();
        let scores: Vec<f64> = self.result_history.iter().filter_map(|r| r.overall_score).collect();
        let average_confidence = (!confidences.is_empty()).then(|| confidences.iter().mean());
        let average_score = (!scores.is_empty()).then(|| scores.iter().mean());

        SessionStatistics {
            frames_processed: self.frames_processed,
            active_frames: active.len(),
            average_confidence,
            average_score,
            exercise_frames,
            reps,
            current_exercise: self.current_exercise(),
            energy: self.biomechanics.session_energy(),
            power: self.biomechanics.power_statistics(),
        }
    }

    pub fn current_exercise(&self) -> ExerciseType {
        self.state
            .current
            .map_or(ExerciseType::Idle, |i| self.analyzers[i].exercise_type())
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn body_parameters(&self) -> &AnthropometricModel {
        self.biomechanics.body()
    }

    pub fn frame_history(&self) -> &RingBuffer<PoseFrame> {
        &self.frame_history
    }

    pub fn filter_bank(&self) -> &FilterBank {
        &self.filter_bank
    }

    pub fn kinematics(&self) -> &KinematicsTracker {
        &self.kinematics
    }

    /// Return to idle and forget every history, analyzer and filter state
    pub fn reset(&mut self) {
        for analyzer in &mut self.analyzers {
            analyzer.reset();
        }
        self.kinematics.reset();
        self.biomechanics.reset();
        self.filter_bank.reset();
        self.frame_history.clear();
        self.result_history.clear();
        self.state = EngineState::default();
        self.frames_processed = 0;
        self.last_timestamp_ms = None;
        info!("Analysis engine reset");
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::build(EngineConfig::default(), AnthropometricModel::default())
    }
}

/// Weighted mean of the available quality components minus a risk penalty, in [0, 100]
fn overall_score(result: &AnalysisResult) -> Option<f64> {
    let bio = &result.biomechanics;
    let components = [
        (result.form_score, FORM_WEIGHT),
        (bio.symmetry.as_ref().map(|s| s.overall_score), SYMMETRY_WEIGHT),
        (bio.stability.as_ref().and_then(|s| s.posture_score), POSTURE_WEIGHT),
        (bio.efficiency.as_ref().map(|e| e.overall * 100.0), EFFICIENCY_WEIGHT),
    ];

    let (weighted, weights) = components
        .iter()
        .filter_map(|(value, weight)| value.map(|v| (v * weight, *weight)))
        .fold((0.0, 0.0), |(sum, total), (v, w)| (sum + v, total + w));
    if weights <= 0.0 {
        return None;
    }

    let penalty = match bio.risk.as_ref().map(|r| r.level) {
        Some(RiskLevel::High) => 25.0,
        Some(RiskLevel::Medium) => 10.0,
        _ => 0.0,
    };
    Some((weighted / weights - penalty).clamp(0.0, 100.0))
}

/// Coaching cues: critical issues first, then risk, symmetry, stability and efficiency
fn recommendations(result: &AnalysisResult) -> Vec<String> {
    let bio = &result.biomechanics;
    let mut issues = result.issues.clone();
    issues.sort_by_key(|issue| issue.severity);

    let mut candidates: Vec<String> = issues.into_iter().map(|issue| issue.description).collect();
    if let Some(risk) = &bio.risk {
        candidates.extend(risk.recommendations.iter().cloned());
    }
    if bio.symmetry.as_ref().is_some_and(|s| s.overall_score < LOW_SYMMETRY_SCORE) {
        candidates.push("Work on balancing your left and right sides".to_string());
    }
    if bio
        .stability
        .as_ref()
        .and_then(|s| s.is_stable)
        .is_some_and(|stable| !stable)
    {
        candidates.push("Keep your centre of mass over your feet".to_string());
    }
    if bio.efficiency.as_ref().is_some_and(|e| e.overall < LOW_EFFICIENCY) {
        candidates.push("Move more smoothly to waste less energy".to_string());
    }

    let mut recommendations: Vec<String> = Vec::new();
    for candidate in candidates {
        if !recommendations.contains(&candidate) {
            recommendations.push(candidate);
        }
        if recommendations.len() == MAX_RECOMMENDATIONS {
            break;
        }
    }
    recommendations
}
