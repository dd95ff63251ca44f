use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use validator::Validate;

use crate::config::filter::FilterParameters;
use crate::errors::MotionError;
use crate::models::validation::{bound, collect_violations, finite};

/// Upper bound for history buffers, keeps a misconfigured engine from hoarding frames
pub const MAX_HISTORY_CAP: usize = 10_000;

/// Analysis engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum detection confidence to activate an exercise, in (0, 1]
    #[validate(range(exclusive_min = 0.0, max = 1.0), custom(function = "finite"))]
    pub confidence_threshold: f64,
    /// Minimum time between two exercise switches
    pub switch_cooldown_ms: u64,
    /// Capacity of the frame history and per-keypoint kinematics windows
    #[validate(range(min = 1, max = 10_000))]
    pub max_history_length: usize,
    pub enable_biomechanics: bool,
    pub enable_kinematics: bool,
    pub enable_filtering: bool,
    /// Keypoints scoring below this are treated as missing
    #[validate(range(min = 0.0, max = 1.0), custom(function = "finite"))]
    pub min_keypoint_confidence: f64,
    /// Below this best detection confidence the engine falls back to idle
    #[validate(range(min = 0.0, max = 1.0), custom(function = "finite"))]
    pub idle_confidence_floor: f64,
    pub filter: FilterParameters,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            switch_cooldown_ms: 1000,
            max_history_length: 30,
            enable_biomechanics: true,
            enable_kinematics: true,
            enable_filtering: true,
            min_keypoint_confidence: 0.3,
            idle_confidence_floor: 0.1,
            filter: FilterParameters::default(),
        }
    }
}

impl EngineConfig {
    /// Check every field, reporting all violations at once
    pub fn validate(&self) -> Result<(), MotionError> {
        let mut violations = collect_violations(
            Validate::validate(self),
            &[
                bound("confidence_threshold", self.confidence_threshold, 0.0, 1.0),
                bound(
                    "max_history_length",
                    self.max_history_length as f64,
                    1.0,
                    MAX_HISTORY_CAP as f64,
                ),
                bound("min_keypoint_confidence", self.min_keypoint_confidence, 0.0, 1.0),
                bound("idle_confidence_floor", self.idle_confidence_floor, 0.0, 1.0),
            ],
        )
        .err()
        .unwrap_or_default();
        if let Err(MotionError::InvalidFilterParameters(filter_violations)) = self.filter.validate() {
            violations.extend(filter_violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(MotionError::InvalidConfig(violations))
        }
    }

    /// Create configuration from `MOTION_COACH_*` environment variables over defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            confidence_threshold: env_or("MOTION_COACH_CONFIDENCE_THRESHOLD", defaults.confidence_threshold)?,
            switch_cooldown_ms: env_or("MOTION_COACH_SWITCH_COOLDOWN_MS", defaults.switch_cooldown_ms)?,
            max_history_length: env_or("MOTION_COACH_MAX_HISTORY_LENGTH", defaults.max_history_length)?,
            enable_biomechanics: env_or("MOTION_COACH_ENABLE_BIOMECHANICS", defaults.enable_biomechanics)?,
            enable_kinematics: env_or("MOTION_COACH_ENABLE_KINEMATICS", defaults.enable_kinematics)?,
            enable_filtering: env_or("MOTION_COACH_ENABLE_FILTERING", defaults.enable_filtering)?,
            min_keypoint_confidence: env_or(
                "MOTION_COACH_MIN_KEYPOINT_CONFIDENCE",
                defaults.min_keypoint_confidence,
            )?,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply a partial update, returning the merged configuration
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        Self {
            confidence_threshold: update.confidence_threshold.unwrap_or(self.confidence_threshold),
            switch_cooldown_ms: update.switch_cooldown_ms.unwrap_or(self.switch_cooldown_ms),
            max_history_length: update.max_history_length.unwrap_or(self.max_history_length),
            enable_biomechanics: update.enable_biomechanics.unwrap_or(self.enable_biomechanics),
            enable_kinematics: update.enable_kinematics.unwrap_or(self.enable_kinematics),
            enable_filtering: update.enable_filtering.unwrap_or(self.enable_filtering),
            min_keypoint_confidence: update
                .min_keypoint_confidence
                .unwrap_or(self.min_keypoint_confidence),
            idle_confidence_floor: update.idle_confidence_floor.unwrap_or(self.idle_confidence_floor),
            filter: self.filter,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}={}", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Runtime configuration change; every field is optional and applied on the next frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub confidence_threshold: Option<f64>,
    pub switch_cooldown_ms: Option<u64>,
    pub max_history_length: Option<usize>,
    pub enable_biomechanics: Option<bool>,
    pub enable_kinematics: Option<bool>,
    pub enable_filtering: Option<bool>,
    pub min_keypoint_confidence: Option<f64>,
    pub idle_confidence_floor: Option<f64>,
}
