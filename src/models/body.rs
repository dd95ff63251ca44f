/// Body model: joints measured from keypoints, anthropometric segment table,
/// and the movement envelopes used for risk assessment.
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::MotionError;
use crate::models::keypoint::CocoKeypoint;
use crate::models::validation::{bound, collect_violations, finite};

/// Gravitational acceleration (m/s²)
pub const GRAVITY: f64 = 9.81;

pub const MIN_HEIGHT_M: f64 = 0.5;
pub const MAX_HEIGHT_M: f64 = 2.5;
pub const MIN_MASS_KG: f64 = 20.0;
pub const MAX_MASS_KG: f64 = 300.0;

pub const DEFAULT_HEIGHT_M: f64 = 1.70;
pub const DEFAULT_MASS_KG: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// How a joint's angle is measured from keypoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointDefinition {
    /// Angle at the middle keypoint between the two adjacent segments, in [0, 180]
    ThreePoint(CocoKeypoint, CocoKeypoint, CocoKeypoint),
    /// Signed angle of the segment `upper -> lower` from the downward vertical
    SegmentLean(CocoKeypoint, CocoKeypoint),
    /// Signed angle of the mid-shoulder -> mid-hip line from the downward vertical
    TrunkLean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    Torso,
}

pub const JOINT_COUNT: usize = 11;

impl Joint {
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
        Joint::Torso,
    ];

    /// Left/right pairs compared for symmetry
    pub const BILATERAL_PAIRS: [(Joint, Joint); 5] = [
        (Joint::LeftShoulder, Joint::RightShoulder),
        (Joint::LeftElbow, Joint::RightElbow),
        (Joint::LeftHip, Joint::RightHip),
        (Joint::LeftKnee, Joint::RightKnee),
        (Joint::LeftAnkle, Joint::RightAnkle),
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
            Joint::Torso => "torso",
        }
    }

    /// Human-readable name used in recommendations
    pub fn label(&self) -> String {
        self.name().replace('_', " ")
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Joint::LeftShoulder | Joint::LeftElbow | Joint::LeftHip | Joint::LeftKnee | Joint::LeftAnkle => {
                Some(Side::Left)
            }
            Joint::Torso => None,
            _ => Some(Side::Right),
        }
    }

    pub fn definition(&self) -> JointDefinition {
        use CocoKeypoint::*;
        match self {
            Joint::LeftShoulder => JointDefinition::ThreePoint(LeftHip, LeftShoulder, LeftElbow),
            Joint::RightShoulder => JointDefinition::ThreePoint(RightHip, RightShoulder, RightElbow),
            Joint::LeftElbow => JointDefinition::ThreePoint(LeftShoulder, LeftElbow, LeftWrist),
            Joint::RightElbow => JointDefinition::ThreePoint(RightShoulder, RightElbow, RightWrist),
            Joint::LeftHip => JointDefinition::ThreePoint(LeftShoulder, LeftHip, LeftKnee),
            Joint::RightHip => JointDefinition::ThreePoint(RightShoulder, RightHip, RightKnee),
            Joint::LeftKnee => JointDefinition::ThreePoint(LeftHip, LeftKnee, LeftAnkle),
            Joint::RightKnee => JointDefinition::ThreePoint(RightHip, RightKnee, RightAnkle),
            Joint::LeftAnkle => JointDefinition::SegmentLean(LeftKnee, LeftAnkle),
            Joint::RightAnkle => JointDefinition::SegmentLean(RightKnee, RightAnkle),
            Joint::Torso => JointDefinition::TrunkLean,
        }
    }

    /// Segment rotated by this joint, used for the inverse-dynamics estimate
    pub fn distal_segment(&self) -> Segment {
        match self {
            Joint::LeftShoulder | Joint::RightShoulder => Segment::UpperArm,
            Joint::LeftElbow | Joint::RightElbow => Segment::Forearm,
            Joint::LeftHip | Joint::RightHip => Segment::Thigh,
            Joint::LeftKnee | Joint::RightKnee => Segment::Shank,
            Joint::LeftAnkle | Joint::RightAnkle => Segment::Foot,
            Joint::Torso => Segment::Trunk,
        }
    }

    /// Safe movement envelope in degrees
    pub fn safe_range(&self) -> JointRange {
        match self {
            Joint::LeftShoulder | Joint::RightShoulder => JointRange::new(0.0, 180.0),
            Joint::LeftElbow | Joint::RightElbow => JointRange::new(20.0, 180.0),
            Joint::LeftHip | Joint::RightHip => JointRange::new(40.0, 180.0),
            Joint::LeftKnee | Joint::RightKnee => JointRange::new(30.0, 180.0),
            Joint::LeftAnkle | Joint::RightAnkle => JointRange::new(-45.0, 45.0),
            Joint::Torso => JointRange::new(-110.0, 110.0),
        }
    }
}

/// Movement envelope (degrees) for one joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointRange {
    pub min_deg: f64,
    pub max_deg: f64,
}

impl JointRange {
    pub const fn new(min_deg: f64, max_deg: f64) -> Self {
        Self { min_deg, max_deg }
    }

    /// Degrees beyond the envelope; zero when inside
    pub fn excess(&self, angle_deg: f64) -> f64 {
        if angle_deg < self.min_deg {
            self.min_deg - angle_deg
        } else if angle_deg > self.max_deg {
            angle_deg - self.max_deg
        } else {
            0.0
        }
    }
}

/// Body segments of the anthropometric table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    HeadNeck,
    Trunk,
    UpperArm,
    Forearm,
    Hand,
    Thigh,
    Shank,
    Foot,
}

impl Segment {
    /// Segment length as a fraction of body height (Winter)
    pub fn length_ratio(&self) -> f64 {
        match self {
            Segment::HeadNeck => 0.182,
            Segment::Trunk => 0.288,
            Segment::UpperArm => 0.186,
            Segment::Forearm => 0.146,
            Segment::Hand => 0.108,
            Segment::Thigh => 0.245,
            Segment::Shank => 0.246,
            Segment::Foot => 0.152,
        }
    }

    /// Segment mass as a fraction of body mass (Winter)
    pub fn mass_ratio(&self) -> f64 {
        match self {
            Segment::HeadNeck => 0.081,
            Segment::Trunk => 0.497,
            Segment::UpperArm => 0.028,
            Segment::Forearm => 0.016,
            Segment::Hand => 0.006,
            Segment::Thigh => 0.100,
            Segment::Shank => 0.0465,
            Segment::Foot => 0.0145,
        }
    }
}

/// Anthropometric body model scaled by the user's height and mass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct AnthropometricModel {
    #[validate(range(min = 0.5, max = 2.5), custom(function = "finite"))]
    height_m: f64,
    #[validate(range(min = 20.0, max = 300.0), custom(function = "finite"))]
    mass_kg: f64,
}

impl AnthropometricModel {
    pub fn new(height_m: f64, mass_kg: f64) -> Result<Self, MotionError> {
        let model = Self { height_m, mass_kg };
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<(), MotionError> {
        collect_violations(
            self.validate(),
            &[
                bound("height_m", self.height_m, MIN_HEIGHT_M, MAX_HEIGHT_M),
                bound("mass_kg", self.mass_kg, MIN_MASS_KG, MAX_MASS_KG),
            ],
        )
        .map_err(MotionError::InvalidBodyParameters)
    }

    /// Replace height and mass; on error the previous values are kept
    pub fn set_body_parameters(&mut self, height_m: f64, mass_kg: f64) -> Result<(), MotionError> {
        *self = Self::new(height_m, mass_kg)?;
        Ok(())
    }

    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    pub fn segment_length(&self, segment: Segment) -> f64 {
        segment.length_ratio() * self.height_m
    }

    pub fn segment_mass(&self, segment: Segment) -> f64 {
        segment.mass_ratio() * self.mass_kg
    }
}

impl Default for AnthropometricModel {
    fn default() -> Self {
        Self {
            height_m: DEFAULT_HEIGHT_M,
            mass_kg: DEFAULT_MASS_KG,
        }
    }
}
