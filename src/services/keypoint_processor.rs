/// Keypoint Processing Service
///
/// Pose geometry shared by the exercise analyzers and the biomechanics engine:
/// - Joint angle calculations (three-point angles and segment lean vs vertical)
/// - Body landmarks derived from several keypoints (neck, mid-hip, torso scale)
/// - Keypoint visibility checks
use std::collections::BTreeMap;

use crate::models::body::{Joint, JointDefinition};
use crate::models::keypoint::{visible, CocoKeypoint, Keypoint, Point2};

/// Relative tolerance under which two segments are treated as collinear
const COLLINEAR_EPSILON: f64 = 1e-12;

/// Angle at `vertex` between the segments to `a` and `c`, in degrees [0, 180].
///
/// Collinear points yield exactly 0 or 180; a zero-length segment yields 0.
pub fn angle_between(a: Point2, vertex: Point2, c: Point2) -> f64 {
    // Vectors from joint to adjacent points
    let ba = (a.x - vertex.x, a.y - vertex.y);
    let bc = (c.x - vertex.x, c.y - vertex.y);

    let mag_ba = ba.0.hypot(ba.1);
    let mag_bc = bc.0.hypot(bc.1);
    if mag_ba == 0.0 || mag_bc == 0.0 || !(mag_ba * mag_bc).is_finite() {
        return 0.0;
    }

    let dot = ba.0 * bc.0 + ba.1 * bc.1;
    let cross = ba.0 * bc.1 - ba.1 * bc.0;
    if cross.abs() <= COLLINEAR_EPSILON * mag_ba * mag_bc {
        return if dot >= 0.0 { 0.0 } else { 180.0 };
    }

    let cos_angle = (dot / (mag_ba * mag_bc)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Signed angle (degrees) of the segment `upper -> lower` from the downward vertical.
///
/// Zero when `lower` is straight below `upper`; positive when `lower` lies to
/// the right. Unbounded in (-180, 180].
pub fn lean_from_vertical(upper: Point2, lower: Point2) -> f64 {
    let dx = lower.x - upper.x;
    let dy = lower.y - upper.y;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    dx.atan2(dy).to_degrees()
}

/// Keypoint processor bound to a confidence threshold
#[derive(Debug, Clone, Copy)]
pub struct KeypointProcessor {
    /// Minimum confidence threshold for valid keypoints
    min_confidence: f64,
}

impl KeypointProcessor {
    pub fn new() -> Self {
        Self { min_confidence: 0.3 }
    }

    /// Set minimum confidence threshold
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Position of a keypoint if it is present and confident
    pub fn point(&self, keypoints: &[Keypoint], which: CocoKeypoint) -> Option<Point2> {
        visible(keypoints, which, self.min_confidence).map(Keypoint::position)
    }

    /// Midpoint of two keypoints when both are visible
    pub fn midpoint(&self, keypoints: &[Keypoint], a: CocoKeypoint, b: CocoKeypoint) -> Option<Point2> {
        Some(self.point(keypoints, a)?.midpoint(&self.point(keypoints, b)?))
    }

    /// Midpoint between the shoulders
    pub fn neck(&self, keypoints: &[Keypoint]) -> Option<Point2> {
        self.midpoint(keypoints, CocoKeypoint::LeftShoulder, CocoKeypoint::RightShoulder)
    }

    /// Midpoint between the hips
    pub fn mid_hip(&self, keypoints: &[Keypoint]) -> Option<Point2> {
        self.midpoint(keypoints, CocoKeypoint::LeftHip, CocoKeypoint::RightHip)
    }

    /// Shoulder point of the more visible side, or the neck when both are visible
    pub fn shoulder_center(&self, keypoints: &[Keypoint]) -> Option<Point2> {
        self.neck(keypoints)
            .or_else(|| self.point(keypoints, CocoKeypoint::LeftShoulder))
            .or_else(|| self.point(keypoints, CocoKeypoint::RightShoulder))
    }

    /// Hip point of the more visible side, or the mid-hip when both are visible
    pub fn hip_center(&self, keypoints: &[Keypoint]) -> Option<Point2> {
        self.mid_hip(keypoints)
            .or_else(|| self.point(keypoints, CocoKeypoint::LeftHip))
            .or_else(|| self.point(keypoints, CocoKeypoint::RightHip))
    }

    /// Ankle point of the more visible side, or the midpoint when both are visible
    pub fn ankle_center(&self, keypoints: &[Keypoint]) -> Option<Point2> {
        self.midpoint(keypoints, CocoKeypoint::LeftAnkle, CocoKeypoint::RightAnkle)
            .or_else(|| self.point(keypoints, CocoKeypoint::LeftAnkle))
            .or_else(|| self.point(keypoints, CocoKeypoint::RightAnkle))
    }

    /// Shoulder-to-hip distance, the reference length for scale-free thresholds
    pub fn torso_length(&self, keypoints: &[Keypoint]) -> Option<f64> {
        let length = self
            .shoulder_center(keypoints)?
            .distance_to(&self.hip_center(keypoints)?);
        (length > 0.0).then_some(length)
    }

    /// Calculate joint angle from three keypoints
    pub fn three_point_angle(
        &self,
        keypoints: &[Keypoint],
        a: CocoKeypoint,
        vertex: CocoKeypoint,
        c: CocoKeypoint,
    ) -> Option<f64> {
        Some(angle_between(
            self.point(keypoints, a)?,
            self.point(keypoints, vertex)?,
            self.point(keypoints, c)?,
        ))
    }

    /// Signed lean of the trunk (mid-shoulder -> mid-hip) from vertical
    pub fn trunk_lean(&self, keypoints: &[Keypoint]) -> Option<f64> {
        Some(lean_from_vertical(
            self.shoulder_center(keypoints)?,
            self.hip_center(keypoints)?,
        ))
    }

    /// Angle of one joint, `None` when any contributing keypoint is missing
    pub fn joint_angle(&self, keypoints: &[Keypoint], joint: Joint) -> Option<f64> {
        match joint.definition() {
            JointDefinition::ThreePoint(a, vertex, c) => self.three_point_angle(keypoints, a, vertex, c),
            JointDefinition::SegmentLean(upper, lower) => Some(lean_from_vertical(
                self.point(keypoints, upper)?,
                self.point(keypoints, lower)?,
            )),
            JointDefinition::TrunkLean => self.trunk_lean(keypoints),
        }
    }

    /// Calculate all joint angles for a pose; missing joints are omitted
    pub fn calculate_all_joint_angles(&self, keypoints: &[Keypoint]) -> BTreeMap<Joint, f64> {
        Joint::ALL
            .iter()
            .filter_map(|joint| Some((*joint, self.joint_angle(keypoints, *joint)?)))
            .collect()
    }

    /// Mean of the left and right angles, or whichever side is visible
    pub fn bilateral_angle(&self, keypoints: &[Keypoint], left: Joint, right: Joint) -> Option<f64> {
        match (self.joint_angle(keypoints, left), self.joint_angle(keypoints, right)) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }
}

impl Default for KeypointProcessor {
    fn default() -> Self {
        Self::new()
    }
}
