use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::MotionError;
use crate::models::validation::{bound, collect_violations, finite};

pub const MIN_FREQUENCY: f64 = 1.0;
pub const MAX_FREQUENCY: f64 = 240.0;
pub const MIN_CUTOFF_RANGE: (f64, f64) = (0.001, 10.0);
pub const BETA_RANGE: (f64, f64) = (0.0, 10.0);
pub const D_CUTOFF_RANGE: (f64, f64) = (0.001, 10.0);

/// One-Euro filter coefficients shared by every channel of the filter bank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FilterParameters {
    /// Nominal sampling rate (Hz)
    #[validate(range(min = 1.0, max = 240.0), custom(function = "finite"))]
    pub frequency: f64,
    /// Minimum cutoff frequency (Hz) - lower = smoother at rest
    #[validate(range(min = 0.001, max = 10.0), custom(function = "finite"))]
    pub min_cutoff: f64,
    /// Speed coefficient - higher = less lag during fast motion
    #[validate(range(min = 0.0, max = 10.0), custom(function = "finite"))]
    pub beta: f64,
    /// Derivative cutoff frequency (Hz)
    #[validate(range(min = 0.001, max = 10.0), custom(function = "finite"))]
    pub d_cutoff: f64,
}

impl Default for FilterParameters {
    fn default() -> Self {
        Self {
            frequency: 30.0,
            min_cutoff: 1.0,
            beta: 0.007,
            d_cutoff: 1.0,
        }
    }
}

impl FilterParameters {
    /// Check every field, reporting all out-of-range values at once
    pub fn validate(&self) -> Result<(), MotionError> {
        collect_violations(
            Validate::validate(self),
            &[
                bound("frequency", self.frequency, MIN_FREQUENCY, MAX_FREQUENCY),
                bound("min_cutoff", self.min_cutoff, MIN_CUTOFF_RANGE.0, MIN_CUTOFF_RANGE.1),
                bound("beta", self.beta, BETA_RANGE.0, BETA_RANGE.1),
                bound("d_cutoff", self.d_cutoff, D_CUTOFF_RANGE.0, D_CUTOFF_RANGE.1),
            ],
        )
        .map_err(MotionError::InvalidFilterParameters)
    }

    /// Clamp every field into its valid range
    pub fn clamped(&self) -> Self {
        Self {
            frequency: self.frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY),
            min_cutoff: self.min_cutoff.clamp(MIN_CUTOFF_RANGE.0, MIN_CUTOFF_RANGE.1),
            beta: self.beta.clamp(BETA_RANGE.0, BETA_RANGE.1),
            d_cutoff: self.d_cutoff.clamp(D_CUTOFF_RANGE.0, D_CUTOFF_RANGE.1),
        }
    }

    /// Apply a partial update on top of these parameters
    pub fn merged(&self, update: &FilterParameterUpdate) -> Self {
        Self {
            frequency: update.frequency.unwrap_or(self.frequency),
            min_cutoff: update.min_cutoff.unwrap_or(self.min_cutoff),
            beta: update.beta.unwrap_or(self.beta),
            d_cutoff: update.d_cutoff.unwrap_or(self.d_cutoff),
        }
    }
}

/// Partial filter parameter change; absent fields keep their current value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterParameterUpdate {
    pub frequency: Option<f64>,
    pub min_cutoff: Option<f64>,
    pub beta: Option<f64>,
    pub d_cutoff: Option<f64>,
}

impl From<FilterParameters> for FilterParameterUpdate {
    fn from(params: FilterParameters) -> Self {
        Self {
            frequency: Some(params.frequency),
            min_cutoff: Some(params.min_cutoff),
            beta: Some(params.beta),
            d_cutoff: Some(params.d_cutoff),
        }
    }
}
