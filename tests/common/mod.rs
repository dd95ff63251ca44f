// Shared pose fixtures for the integration tests
#![allow(dead_code)]

use motion_coach::config::{ConfigUpdate, EngineConfig};
use motion_coach::models::{CocoKeypoint, Keypoint, KEYPOINT_COUNT};
use motion_coach::AnalysisEngine;

/// Frame spacing at 30 fps
pub const FRAME_MS: f64 = 1000.0 / 30.0;

/// Builds synthetic COCO-17 poses in image coordinates (y grows downwards)
pub struct PoseGenerator;

impl PoseGenerator {
    fn blank() -> Vec<Keypoint> {
        vec![Keypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT]
    }

    fn set(kps: &mut [Keypoint], which: CocoKeypoint, x: f64, y: f64) {
        kps[which.index()] = Keypoint::new(x, y, 0.9);
    }

    /// Side view with overlapping legs; `bottom` puts knees and hips at 90°
    pub fn squat(bottom: bool) -> Vec<Keypoint> {
        let mut kps = Self::blank();
        Self::set(&mut kps, CocoKeypoint::Nose, 300.0, 150.0);
        let (shoulder_y, hip_y, knee_x, knee_y) = if bottom {
            (250.0, 450.0, 400.0, 450.0)
        } else {
            (200.0, 400.0, 300.0, 500.0)
        };
        let ankle_x = if bottom { 400.0 } else { 300.0 };
        for (s, h, k, a) in [
            (CocoKeypoint::LeftShoulder, CocoKeypoint::LeftHip, CocoKeypoint::LeftKnee, CocoKeypoint::LeftAnkle),
            (CocoKeypoint::RightShoulder, CocoKeypoint::RightHip, CocoKeypoint::RightKnee, CocoKeypoint::RightAnkle),
        ] {
            Self::set(&mut kps, s, 300.0, shoulder_y);
            Self::set(&mut kps, h, 300.0, hip_y);
            Self::set(&mut kps, k, knee_x, knee_y);
            Self::set(&mut kps, a, ankle_x, 600.0);
        }
        kps
    }

    /// Standing still, side view
    pub fn standing() -> Vec<Keypoint> {
        Self::squat(false)
    }

    /// Frontal view; `open` raises the arms overhead and spreads the feet
    pub fn jumping_jack(open: bool) -> Vec<Keypoint> {
        let mut kps = Self::blank();
        Self::set(&mut kps, CocoKeypoint::Nose, 320.0, 120.0);
        Self::set(&mut kps, CocoKeypoint::LeftShoulder, 360.0, 200.0);
        Self::set(&mut kps, CocoKeypoint::RightShoulder, 280.0, 200.0);
        Self::set(&mut kps, CocoKeypoint::LeftHip, 350.0, 400.0);
        Self::set(&mut kps, CocoKeypoint::RightHip, 290.0, 400.0);
        if open {
            Self::set(&mut kps, CocoKeypoint::LeftElbow, 400.0, 130.0);
            Self::set(&mut kps, CocoKeypoint::RightElbow, 240.0, 130.0);
            Self::set(&mut kps, CocoKeypoint::LeftWrist, 420.0, 60.0);
            Self::set(&mut kps, CocoKeypoint::RightWrist, 220.0, 60.0);
            Self::set(&mut kps, CocoKeypoint::LeftKnee, 385.0, 500.0);
            Self::set(&mut kps, CocoKeypoint::RightKnee, 255.0, 500.0);
            Self::set(&mut kps, CocoKeypoint::LeftAnkle, 420.0, 600.0);
            Self::set(&mut kps, CocoKeypoint::RightAnkle, 220.0, 600.0);
        } else {
            Self::set(&mut kps, CocoKeypoint::LeftElbow, 370.0, 300.0);
            Self::set(&mut kps, CocoKeypoint::RightElbow, 270.0, 300.0);
            Self::set(&mut kps, CocoKeypoint::LeftWrist, 375.0, 390.0);
            Self::set(&mut kps, CocoKeypoint::RightWrist, 265.0, 390.0);
            Self::set(&mut kps, CocoKeypoint::LeftKnee, 350.0, 500.0);
            Self::set(&mut kps, CocoKeypoint::RightKnee, 290.0, 500.0);
            Self::set(&mut kps, CocoKeypoint::LeftAnkle, 350.0, 600.0);
            Self::set(&mut kps, CocoKeypoint::RightAnkle, 290.0, 600.0);
        }
        kps
    }

    /// Side view, straight body; `down` bends the elbows
    pub fn push_up(down: bool) -> Vec<Keypoint> {
        let mut kps = Self::blank();
        let shoulder_y = if down { 420.0 } else { 350.0 };
        for (s, e, w, h, a) in [
            (
                CocoKeypoint::LeftShoulder,
                CocoKeypoint::LeftElbow,
                CocoKeypoint::LeftWrist,
                CocoKeypoint::LeftHip,
                CocoKeypoint::LeftAnkle,
            ),
            (
                CocoKeypoint::RightShoulder,
                CocoKeypoint::RightElbow,
                CocoKeypoint::RightWrist,
                CocoKeypoint::RightHip,
                CocoKeypoint::RightAnkle,
            ),
        ] {
            Self::set(&mut kps, s, 200.0, shoulder_y);
            if down {
                Self::set(&mut kps, e, 270.0, 430.0);
            } else {
                Self::set(&mut kps, e, 200.0, 425.0);
            }
            Self::set(&mut kps, w, 200.0, 500.0);
            Self::set(&mut kps, h, 400.0, (shoulder_y + 480.0) / 2.0);
            Self::set(&mut kps, a, 600.0, 480.0);
        }
        kps
    }

    /// Drop keypoints below any confidence threshold
    pub fn without(mut kps: Vec<Keypoint>, which: &[CocoKeypoint]) -> Vec<Keypoint> {
        for k in which {
            kps[k.index()].score = 0.0;
        }
        kps
    }
}

/// Engine with filtering off so poses reach the analyzers unchanged
pub fn unfiltered_engine() -> AnalysisEngine {
    let mut engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    engine
        .update_config(&ConfigUpdate {
            enable_filtering: Some(false),
            ..Default::default()
        })
        .unwrap();
    engine
}

/// Feed `poses` at 30 fps starting at frame `start`, returning every result
pub fn feed(
    engine: &mut AnalysisEngine,
    start: usize,
    poses: &[Vec<Keypoint>],
) -> Vec<motion_coach::AnalysisResult> {
    poses
        .iter()
        .enumerate()
        .map(|(i, kps)| {
            let frame = start + i;
            engine.process_frame(kps, frame as f64 * FRAME_MS, FRAME_MS / 1000.0)
        })
        .collect()
}

/// `count` alternations of `a` and `b`, `hold` frames each
pub fn alternate(a: &[Keypoint], b: &[Keypoint], count: usize, hold: usize) -> Vec<Vec<Keypoint>> {
    (0..count)
        .flat_map(|i| std::iter::repeat(if i % 2 == 0 { a.to_vec() } else { b.to_vec() }).take(hold))
        .collect()
}
