use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::info;

use crate::errors::MotionError;
use crate::models::biomechanics::{
    BaseOfSupport, BiomechanicsReport, EfficiencyAnalysis, EnergyEstimate, JointSymmetry,
    PositionalSymmetry, PowerAnalysis, PowerStatistics, RiskAssessment, RiskCategory, RiskFactor,
    RiskLevel, StabilityAnalysis, SymmetryAnalysis,
};
use crate::models::analysis::ExerciseType;
use crate::models::body::{AnthropometricModel, Joint, Segment, GRAVITY, JOINT_COUNT};
use crate::models::history::RingBuffer;
use crate::models::keypoint::{CocoKeypoint, Keypoint, Point2};
use crate::services::keypoint_processor::KeypointProcessor;
use crate::services::kinematics_tracker::KinematicsTracker;

/// Rolling window of total-power samples kept for statistics
pub const POWER_HISTORY_CAP: usize = 100;
/// Frames of head/shoulder/hip positions used for posture stability
pub const POSTURE_HISTORY_CAP: usize = 30;
/// Left/right pairs differing by less than this percentage are symmetric
pub const SYMMETRY_THRESHOLD_PCT: f64 = 10.0;
/// Padding (px) around the ankles for the base of support
pub const BASE_OF_SUPPORT_PADDING_PX: f64 = 50.0;
/// Assumed muscular efficiency converting metabolic to mechanical work
pub const MUSCLE_EFFICIENCY: f64 = 0.25;
pub const KCAL_PER_JOULE: f64 = 0.000239;
/// Degrees beyond a safe range that separate medium from high risk
pub const RISK_MARGIN_DEG: f64 = 10.0;

const VELOCITY_MEDIUM_PX_S: f64 = 800.0;
const VELOCITY_HIGH_PX_S: f64 = 1500.0;
const IMBALANCE_MEDIUM: f64 = 0.2;
const IMBALANCE_HIGH: f64 = 0.3;
/// Summed limb speed (px/s) under which imbalance is not evaluated
const IMBALANCE_MIN_TOTAL_PX_S: f64 = 50.0;

const POSITIONAL_PAIRS: [(CocoKeypoint, CocoKeypoint); 6] = [
    (CocoKeypoint::LeftShoulder, CocoKeypoint::RightShoulder),
    (CocoKeypoint::LeftElbow, CocoKeypoint::RightElbow),
    (CocoKeypoint::LeftWrist, CocoKeypoint::RightWrist),
    (CocoKeypoint::LeftHip, CocoKeypoint::RightHip),
    (CocoKeypoint::LeftKnee, CocoKeypoint::RightKnee),
    (CocoKeypoint::LeftAnkle, CocoKeypoint::RightAnkle),
];

const POSTURE_LANDMARK_COUNT: usize = 5;

const POSTURE_LANDMARKS: [CocoKeypoint; POSTURE_LANDMARK_COUNT] = [
    CocoKeypoint::Nose,
    CocoKeypoint::LeftShoulder,
    CocoKeypoint::RightShoulder,
    CocoKeypoint::LeftHip,
    CocoKeypoint::RightHip,
];

const FAST_EXTREMITIES: [CocoKeypoint; 4] = [
    CocoKeypoint::LeftWrist,
    CocoKeypoint::RightWrist,
    CocoKeypoint::LeftAnkle,
    CocoKeypoint::RightAnkle,
];

/// Derives joint kinetics, symmetry, stability, energy and injury risk from keypoints
#[derive(Debug, Clone)]
pub struct BiomechanicsEngine {
    body: AnthropometricModel,
    processor: KeypointProcessor,
    previous_angles: [Option<f64>; JOINT_COUNT],
    previous_velocities: [Option<f64>; JOINT_COUNT],
    power_history: RingBuffer<f64>,
    posture_history: RingBuffer<[Option<Point2>; POSTURE_LANDMARK_COUNT]>,
    session_energy: EnergyEstimate,
}

impl BiomechanicsEngine {
    pub fn new(body: AnthropometricModel) -> Self {
        Self {
            body,
            processor: KeypointProcessor::new(),
            previous_angles: [None; JOINT_COUNT],
            previous_velocities: [None; JOINT_COUNT],
            power_history: RingBuffer::new(POWER_HISTORY_CAP),
            posture_history: RingBuffer::new(POSTURE_HISTORY_CAP),
            session_energy: EnergyEstimate::default(),
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.processor = self.processor.with_min_confidence(min_confidence);
        self
    }

    pub fn set_min_confidence(&mut self, min_confidence: f64) {
        self.processor = self.processor.with_min_confidence(min_confidence);
    }

    pub fn body(&self) -> &AnthropometricModel {
        &self.body
    }

    /// Replace the user's height and mass; invalid values leave the model unchanged
    pub fn set_body_parameters(&mut self, height_m: f64, mass_kg: f64) -> Result<(), MotionError> {
        self.body.set_body_parameters(height_m, mass_kg)?;
        info!("Body parameters set to {:.2} m, {:.1} kg", height_m, mass_kg);
        Ok(())
    }

    /// Energy accumulated since construction or the last reset
    pub fn session_energy(&self) -> EnergyEstimate {
        self.session_energy
    }

    /// Mean, peak and spread of total power over the rolling history
    pub fn power_statistics(&self) -> PowerStatistics {
        let samples = self.power_history.len();
        if samples == 0 {
            return PowerStatistics::default();
        }
        PowerStatistics {
            samples,
            mean: self.power_history.iter().mean(),
            peak: self.power_history.iter().fold(0.0_f64, |a, b| a.max(*b)),
            std_dev: self.power_history.iter().population_std_dev(),
        }
    }

    /// Analyze one frame.
    ///
    /// `delta_time_s` drives the angular finite differences and the energy
    /// integration; a non-positive step yields zero rates. Quantities that
    /// cannot be computed from the visible keypoints are omitted.
    pub fn analyze(
        &mut self,
        keypoints: &[Keypoint],
        delta_time_s: f64,
        exercise: ExerciseType,
        kinematics: Option<&KinematicsTracker>,
    ) -> BiomechanicsReport {
        let dt = if delta_time_s.is_finite() && delta_time_s > 0.0 { delta_time_s } else { 0.0 };

        let joint_angles = self.processor.calculate_all_joint_angles(keypoints);
        let (angular_velocities, angular_accelerations) = self.angular_rates(&joint_angles, dt);
        let moments = self.joint_moments(&joint_angles, &angular_accelerations);
        let power = self.power(&moments, &angular_velocities);

        if let Some(power) = &power {
            self.power_history.push(power.total);
        }

        let efficiency = power.as_ref().map(|p| self.efficiency(p, exercise));
        let symmetry = self.symmetry(keypoints, &joint_angles);
        let stability = self.stability(keypoints);
        let energy = power.as_ref().filter(|_| dt > 0.0).map(|p| {
            let mechanical_work_j = p.total * dt;
            let metabolic_cost_j = mechanical_work_j / MUSCLE_EFFICIENCY;
            EnergyEstimate {
                mechanical_work_j,
                metabolic_cost_j,
                calories_kcal: metabolic_cost_j * KCAL_PER_JOULE,
            }
        });
        if let Some(energy) = &energy {
            self.session_energy.accumulate(energy);
        }
        let risk = assess_risk(&joint_angles, kinematics);

        BiomechanicsReport {
            joint_angles,
            angular_velocities,
            angular_accelerations,
            moments,
            power,
            efficiency,
            symmetry,
            stability,
            energy,
            risk,
        }
    }

    /// Finite-difference angular velocity (deg/s) and acceleration (deg/s²)
    fn angular_rates(
        &mut self,
        angles: &BTreeMap<Joint, f64>,
        dt: f64,
    ) -> (BTreeMap<Joint, f64>, BTreeMap<Joint, f64>) {
        let mut velocities = BTreeMap::new();
        let mut accelerations = BTreeMap::new();

        for joint in Joint::ALL {
            let i = joint.index();
            let Some(&angle) = angles.get(&joint) else {
                self.previous_angles[i] = None;
                self.previous_velocities[i] = None;
                continue;
            };

            let velocity = match self.previous_angles[i] {
                Some(previous) if dt > 0.0 => (angle - previous) / dt,
                _ => 0.0,
            };
            let acceleration = match self.previous_velocities[i] {
                Some(previous) if dt > 0.0 => (velocity - previous) / dt,
                _ => 0.0,
            };

            self.previous_angles[i] = Some(angle);
            self.previous_velocities[i] = Some(velocity);
            velocities.insert(joint, velocity);
            accelerations.insert(joint, acceleration);
        }

        (velocities, accelerations)
    }

    /// Uniform-rod inverse dynamics on the distal segment: τ = Iα + m·g·L·sin(θ)/2
    fn joint_moments(
        &self,
        angles: &BTreeMap<Joint, f64>,
        accelerations: &BTreeMap<Joint, f64>,
    ) -> BTreeMap<Joint, f64> {
        angles
            .iter()
            .map(|(joint, angle)| {
                let segment = joint.distal_segment();
                let mass = self.body.segment_mass(segment);
                let length = self.body.segment_length(segment);
                let inertia = mass * length * length / 3.0;
                let alpha = accelerations.get(joint).copied().unwrap_or(0.0).to_radians();
                let gravitational = mass * GRAVITY * length * angle.to_radians().sin() / 2.0;
                (*joint, inertia * alpha + gravitational)
            })
            .collect()
    }

    fn power(&self, moments: &BTreeMap<Joint, f64>, velocities: &BTreeMap<Joint, f64>) -> Option<PowerAnalysis> {
        if moments.is_empty() {
            return None;
        }
        let per_joint: BTreeMap<Joint, f64> = moments
            .iter()
            .map(|(joint, moment)| {
                let omega = velocities.get(joint).copied().unwrap_or(0.0).to_radians();
                (*joint, (moment * omega).abs())
            })
            .collect();
        let total = per_joint.values().sum();
        Some(PowerAnalysis { per_joint, total })
    }

    fn efficiency(&self, power: &PowerAnalysis, exercise: ExerciseType) -> EfficiencyAnalysis {
        let optimal = exercise.optimal_power_per_kg() * self.body.mass_kg();
        let mechanical = if power.total <= f64::EPSILON {
            1.0
        } else {
            (optimal / power.total).min(1.0)
        };

        let mean = power.per_joint.values().mean();
        let distribution = if power.per_joint.len() < 2 || mean <= f64::EPSILON {
            1.0
        } else {
            let cv = power.per_joint.values().population_std_dev() / mean;
            1.0 / (1.0 + cv)
        };

        EfficiencyAnalysis {
            mechanical,
            distribution,
            overall: 0.7 * mechanical + 0.3 * distribution,
        }
    }

    fn symmetry(&self, keypoints: &[Keypoint], angles: &BTreeMap<Joint, f64>) -> Option<SymmetryAnalysis> {
        let joints: Vec<JointSymmetry> = Joint::BILATERAL_PAIRS
            .iter()
            .filter_map(|(left, right)| {
                let left_angle = *angles.get(left)?;
                let right_angle = *angles.get(right)?;
                // Ankle leans are signed and mirror across the centreline
                let asymmetry_percentage = percentage_difference(left_angle.abs(), right_angle.abs());
                Some(JointSymmetry {
                    left: *left,
                    right: *right,
                    left_angle,
                    right_angle,
                    asymmetry_percentage,
                    symmetric: asymmetry_percentage < SYMMETRY_THRESHOLD_PCT,
                })
            })
            .collect();

        let centerline_x = self.centerline_x(keypoints);
        let positional: Vec<PositionalSymmetry> = match centerline_x {
            Some(center) => POSITIONAL_PAIRS
                .iter()
                .filter_map(|(left, right)| {
                    let left_distance = (self.processor.point(keypoints, *left)?.x - center).abs();
                    let right_distance = (self.processor.point(keypoints, *right)?.x - center).abs();
                    let asymmetry_percentage = percentage_difference(left_distance, right_distance);
                    Some(PositionalSymmetry {
                        left: *left,
                        right: *right,
                        left_distance,
                        right_distance,
                        asymmetry_percentage,
                        symmetric: asymmetry_percentage < SYMMETRY_THRESHOLD_PCT,
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        let scores: Vec<f64> = joints
            .iter()
            .map(|j| j.asymmetry_percentage)
            .chain(positional.iter().map(|p| p.asymmetry_percentage))
            .map(|pct| (100.0 - pct).max(0.0))
            .collect();
        if scores.is_empty() {
            return None;
        }

        Some(SymmetryAnalysis {
            joints,
            positional,
            centerline_x,
            overall_score: scores.iter().mean(),
        })
    }

    /// Mean x of the nose, neck and mid-hip, whichever are visible
    fn centerline_x(&self, keypoints: &[Keypoint]) -> Option<f64> {
        let xs: Vec<f64> = [
            self.processor.point(keypoints, CocoKeypoint::Nose),
            self.processor.neck(keypoints),
            self.processor.mid_hip(keypoints),
        ]
        .iter()
        .flatten()
        .map(|p| p.x)
        .collect();
        (!xs.is_empty()).then(|| xs.iter().mean())
    }

    fn stability(&mut self, keypoints: &[Keypoint]) -> Option<StabilityAnalysis> {
        let center_of_mass = self.center_of_mass(keypoints);
        let base_of_support = self.base_of_support(keypoints);
        let is_stable = match (center_of_mass, base_of_support) {
            (Some(com), Some(base)) => Some(base.contains_projection(&com)),
            _ => None,
        };

        let landmarks = POSTURE_LANDMARKS.map(|which| self.processor.point(keypoints, which));
        self.posture_history.push(landmarks);
        let posture_score = self.posture_score();

        if center_of_mass.is_none() && base_of_support.is_none() && posture_score.is_none() {
            return None;
        }
        Some(StabilityAnalysis {
            center_of_mass,
            base_of_support,
            is_stable,
            posture_score,
        })
    }

    /// Mass-weighted mean of visible segment centres; requires the trunk
    fn center_of_mass(&self, keypoints: &[Keypoint]) -> Option<Point2> {
        use CocoKeypoint::*;

        let p = &self.processor;
        let neck = p.neck(keypoints)?;
        let mid_hip = p.mid_hip(keypoints)?;
        let mut segments = vec![(neck.midpoint(&mid_hip), Segment::Trunk)];

        if let Some(nose) = p.point(keypoints, Nose) {
            segments.push((nose, Segment::HeadNeck));
        }
        let limbs = [
            (LeftShoulder, LeftElbow, Segment::UpperArm),
            (RightShoulder, RightElbow, Segment::UpperArm),
            (LeftElbow, LeftWrist, Segment::Forearm),
            (RightElbow, RightWrist, Segment::Forearm),
            (LeftHip, LeftKnee, Segment::Thigh),
            (RightHip, RightKnee, Segment::Thigh),
            (LeftKnee, LeftAnkle, Segment::Shank),
            (RightKnee, RightAnkle, Segment::Shank),
        ];
        for (proximal, distal, segment) in limbs {
            if let Some(center) = p.midpoint(keypoints, proximal, distal) {
                segments.push((center, segment));
            }
        }
        for (which, segment) in [
            (LeftWrist, Segment::Hand),
            (RightWrist, Segment::Hand),
            (LeftAnkle, Segment::Foot),
            (RightAnkle, Segment::Foot),
        ] {
            if let Some(point) = p.point(keypoints, which) {
                segments.push((point, segment));
            }
        }

        let total_mass: f64 = segments.iter().map(|(_, s)| self.body.segment_mass(*s)).sum();
        let (x, y) = segments.iter().fold((0.0, 0.0), |(x, y), (point, segment)| {
            let mass = self.body.segment_mass(*segment);
            (x + point.x * mass, y + point.y * mass)
        });
        Some(Point2::new(x / total_mass, y / total_mass))
    }

    fn base_of_support(&self, keypoints: &[Keypoint]) -> Option<BaseOfSupport> {
        let left = self.processor.point(keypoints, CocoKeypoint::LeftAnkle)?;
        let right = self.processor.point(keypoints, CocoKeypoint::RightAnkle)?;
        Some(BaseOfSupport {
            min_x: left.x.min(right.x) - BASE_OF_SUPPORT_PADDING_PX,
            max_x: left.x.max(right.x) + BASE_OF_SUPPORT_PADDING_PX,
            min_y: left.y.min(right.y) - BASE_OF_SUPPORT_PADDING_PX,
            max_y: left.y.max(right.y) + BASE_OF_SUPPORT_PADDING_PX,
        })
    }

    /// 100 / (1 + mean positional variance / 100) over the posture history
    fn posture_score(&self) -> Option<f64> {
        let variances: Vec<f64> = (0..POSTURE_LANDMARK_COUNT)
            .filter_map(|i| {
                let points: Vec<Point2> = self.posture_history.iter().filter_map(|frame| frame[i]).collect();
                if points.len() < 2 {
                    return None;
                }
                let var_x = points.iter().map(|p| p.x).population_variance();
                let var_y = points.iter().map(|p| p.y).population_variance();
                Some(var_x + var_y)
            })
            .collect();
        if variances.is_empty() {
            return None;
        }
        let mean_variance = variances.iter().mean();
        Some(100.0 / (1.0 + mean_variance / 100.0))
    }

    /// Forget angle history, posture history, power history and session energy
    pub fn reset(&mut self) {
        self.previous_angles = [None; JOINT_COUNT];
        self.previous_velocities = [None; JOINT_COUNT];
        self.power_history.clear();
        self.posture_history.clear();
        self.session_energy = EnergyEstimate::default();
    }
}

impl Default for BiomechanicsEngine {
    fn default() -> Self {
        Self::new(AnthropometricModel::default())
    }
}

/// |a - b| as a percentage of their mean; zero when both are zero
fn percentage_difference(a: f64, b: f64) -> f64 {
    let mean = (a + b) / 2.0;
    if mean <= f64::EPSILON {
        0.0
    } else {
        (a - b).abs() / mean * 100.0
    }
}

fn assess_risk(angles: &BTreeMap<Joint, f64>, kinematics: Option<&KinematicsTracker>) -> Option<RiskAssessment> {
    if angles.is_empty() && kinematics.is_none() {
        return None;
    }

    let mut assessment = RiskAssessment::default();

    for (joint, angle) in angles {
        let range = joint.safe_range();
        let excess = range.excess(*angle);
        if excess <= 0.0 {
            continue;
        }
        let level = if excess > RISK_MARGIN_DEG { RiskLevel::High } else { RiskLevel::Medium };
        push_factor(
            &mut assessment,
            RiskFactor {
                category: RiskCategory::JointRange,
                level,
                joint: Some(*joint),
                description: format!(
                    "{} at {:.0}° is outside its safe range [{:.0}°, {:.0}°]",
                    joint.label(),
                    angle,
                    range.min_deg,
                    range.max_deg
                ),
            },
            format!("Reduce the range of motion at the {}", joint.label()),
        );
    }

    if let Some(tracker) = kinematics {
        for which in FAST_EXTREMITIES {
            let Some(speed) = tracker.velocity(which.index()).map(|v| v.magnitude) else {
                continue;
            };
            let level = if speed > VELOCITY_HIGH_PX_S {
                RiskLevel::High
            } else if speed > VELOCITY_MEDIUM_PX_S {
                RiskLevel::Medium
            } else {
                continue;
            };
            push_factor(
                &mut assessment,
                RiskFactor {
                    category: RiskCategory::Velocity,
                    level,
                    joint: None,
                    description: format!("{} moving at {:.0} px/s", which.name().replace('_', " "), speed),
                },
                "Slow down and control the movement".to_string(),
            );
        }

        let side_speed = |side: &[CocoKeypoint]| -> f64 {
            side.iter()
                .filter_map(|kp| tracker.velocity(kp.index()))
                .map(|v| v.magnitude)
                .sum()
        };
        let left = side_speed(CocoKeypoint::LEFT_LIMBS.as_slice());
        let right = side_speed(CocoKeypoint::RIGHT_LIMBS.as_slice());
        let total = left + right;
        if total > IMBALANCE_MIN_TOTAL_PX_S {
            let imbalance = (left - right).abs() / total;
            let level = if imbalance > IMBALANCE_HIGH {
                Some(RiskLevel::High)
            } else if imbalance > IMBALANCE_MEDIUM {
                Some(RiskLevel::Medium)
            } else {
                None
            };
            if let Some(level) = level {
                push_factor(
                    &mut assessment,
                    RiskFactor {
                        category: RiskCategory::LoadImbalance,
                        level,
                        joint: None,
                        description: format!("Left/right movement imbalance of {:.0}%", imbalance * 100.0),
                    },
                    "Balance the load between left and right sides".to_string(),
                );
            }
        }
    }

    Some(assessment)
}

fn push_factor(assessment: &mut RiskAssessment, factor: RiskFactor, recommendation: String) {
    assessment.level = assessment.level.max(factor.level);
    if !assessment.recommendations.contains(&recommendation) {
        assessment.recommendations.push(recommendation);
    }
    assessment.factors.push(factor);
}
