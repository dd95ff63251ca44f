use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A single field that fell outside its accepted range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundViolation {
    pub field: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for BoundViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} is outside [{}, {}]",
            self.field, self.value, self.min, self.max
        )
    }
}

fn join_violations(violations: &[BoundViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("Invalid filter parameters: {}", join_violations(.0))]
    InvalidFilterParameters(Vec<BoundViolation>),
    #[error("Invalid configuration: {}", join_violations(.0))]
    InvalidConfig(Vec<BoundViolation>),
    #[error("Invalid body parameters: {}", join_violations(.0))]
    InvalidBodyParameters(Vec<BoundViolation>),
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}

impl MotionError {
    /// Violated bounds carried by a validation error, empty for other kinds
    pub fn violations(&self) -> &[BoundViolation] {
        match self {
            MotionError::InvalidFilterParameters(v)
            | MotionError::InvalidConfig(v)
            | MotionError::InvalidBodyParameters(v) => v,
            MotionError::Analysis(_) => &[],
        }
    }
}

/// Failure of a single analyzer on a single frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Missing keypoints for {0}")]
    MissingKeypoints(&'static str),
    #[error("Degenerate geometry for {0}")]
    DegenerateGeometry(&'static str),
}
