/// Keypoint models and data structures
///
/// A frame is an ordered slice of 17 keypoints in COCO order. Coordinates are
/// image pixels; `score` is the detector confidence in [0, 1].
use serde::{Deserialize, Serialize};

/// Number of keypoints in the COCO scheme
pub const KEYPOINT_COUNT: usize = 17;

/// A single anatomical landmark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// X coordinate in image pixels
    pub x: f64,
    /// Y coordinate in image pixels (grows downwards)
    pub y: f64,
    /// Detection confidence (0-1)
    pub score: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, score: f64) -> Self {
        Self { x, y, score }
    }

    /// Check if keypoint is usable for geometry (confident and numeric)
    pub fn is_valid(&self, min_confidence: f64) -> bool {
        self.score >= min_confidence && self.x.is_finite() && self.y.is_finite()
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    /// Euclidean distance to another keypoint
    pub fn distance_to(&self, other: &Keypoint) -> f64 {
        self.position().distance_to(&other.position())
    }
}

/// COCO keypoint indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CocoKeypoint {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl CocoKeypoint {
    pub const ALL: [CocoKeypoint; KEYPOINT_COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    /// Left-side body keypoints from shoulder down
    pub const LEFT_LIMBS: [CocoKeypoint; 6] = [
        Self::LeftShoulder,
        Self::LeftElbow,
        Self::LeftWrist,
        Self::LeftHip,
        Self::LeftKnee,
        Self::LeftAnkle,
    ];

    /// Right-side body keypoints from shoulder down
    pub const RIGHT_LIMBS: [CocoKeypoint; 6] = [
        Self::RightShoulder,
        Self::RightElbow,
        Self::RightWrist,
        Self::RightHip,
        Self::RightKnee,
        Self::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Get keypoint name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

/// 2D point in image space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Velocity or acceleration vector with its magnitude
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
    pub magnitude: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, magnitude: x.hypot(y) }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Filtered keypoints of one frame with its timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Frame timestamp in milliseconds
    pub timestamp_ms: f64,
    /// All keypoints for this frame (17 COCO keypoints)
    pub keypoints: Vec<Keypoint>,
}

impl PoseFrame {
    pub fn new(timestamp_ms: f64, keypoints: Vec<Keypoint>) -> Self {
        Self { timestamp_ms, keypoints }
    }

    /// Get keypoint by COCO index when it clears the confidence threshold
    pub fn keypoint(&self, which: CocoKeypoint, min_confidence: f64) -> Option<&Keypoint> {
        visible(&self.keypoints, which, min_confidence)
    }
}

/// Look up a keypoint that is present and confident enough for geometry
pub fn visible(keypoints: &[Keypoint], which: CocoKeypoint, min_confidence: f64) -> Option<&Keypoint> {
    keypoints
        .get(which.index())
        .filter(|kp| kp.is_valid(min_confidence))
}
