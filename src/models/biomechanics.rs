use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::body::Joint;
use crate::models::keypoint::{CocoKeypoint, Point2};

/// Power per joint (W) and the summed instantaneous power
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerAnalysis {
    pub per_joint: BTreeMap<Joint, f64>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyAnalysis {
    /// min(1, optimal power / total power)
    pub mechanical: f64,
    /// Uniformity of power across joints, 1 / (1 + coefficient of variation)
    pub distribution: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSymmetry {
    pub left: Joint,
    pub right: Joint,
    pub left_angle: f64,
    pub right_angle: f64,
    pub asymmetry_percentage: f64,
    pub symmetric: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionalSymmetry {
    pub left: CocoKeypoint,
    pub right: CocoKeypoint,
    pub left_distance: f64,
    pub right_distance: f64,
    pub asymmetry_percentage: f64,
    pub symmetric: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetryAnalysis {
    pub joints: Vec<JointSymmetry>,
    pub positional: Vec<PositionalSymmetry>,
    /// Body centreline x coordinate used for positional symmetry
    pub centerline_x: Option<f64>,
    /// Mean of max(0, 100 - asymmetry%) across all evaluated pairs
    pub overall_score: f64,
}

/// Padded rectangle spanning both ankles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseOfSupport {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BaseOfSupport {
    /// Ground-projected containment: only the horizontal coordinate matters
    pub fn contains_projection(&self, point: &Point2) -> bool {
        point.x >= self.min_x && point.x <= self.max_x
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityAnalysis {
    pub center_of_mass: Option<Point2>,
    pub base_of_support: Option<BaseOfSupport>,
    pub is_stable: Option<bool>,
    /// 0-100, lower frame-to-frame variance of head/neck/shoulders/hips scores higher
    pub posture_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyEstimate {
    pub mechanical_work_j: f64,
    pub metabolic_cost_j: f64,
    pub calories_kcal: f64,
}

impl EnergyEstimate {
    pub fn accumulate(&mut self, other: &EnergyEstimate) {
        self.mechanical_work_j += other.mechanical_work_j;
        self.metabolic_cost_j += other.metabolic_cost_j;
        self.calories_kcal += other.calories_kcal;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    JointRange,
    Velocity,
    LoadImbalance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub category: RiskCategory,
    pub level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joint: Option<Joint>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub recommendations: Vec<String>,
}

/// Aggregate statistics over the rolling power history
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerStatistics {
    pub samples: usize,
    pub mean: f64,
    pub peak: f64,
    pub std_dev: f64,
}

/// Everything the biomechanics engine derives from one frame.
///
/// Absent maps entries and `None` fields mean "unknown", never zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BiomechanicsReport {
    pub joint_angles: BTreeMap<Joint, f64>,
    pub angular_velocities: BTreeMap<Joint, f64>,
    pub angular_accelerations: BTreeMap<Joint, f64>,
    pub moments: BTreeMap<Joint, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<EfficiencyAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symmetry: Option<SymmetryAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<StabilityAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskAssessment>,
}
