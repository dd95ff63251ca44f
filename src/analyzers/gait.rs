//! Step detection shared by the running and walking analyzers.
//!
//! A step is a change of the leading foot: the sign of the horizontal
//! left-minus-right ankle offset flips. Offsets inside a dead zone scaled by
//! torso length are ignored so standing jitter does not count.

use crate::analyzers::angle_series;
use crate::models::body::Joint;
use crate::models::history::RingBuffer;
use crate::models::keypoint::{CocoKeypoint, Keypoint, PoseFrame};
use crate::services::keypoint_processor::KeypointProcessor;

/// Dead zone as a fraction of torso length
const LEAD_DEAD_ZONE_RATIO: f64 = 0.15;
/// Dead zone used when the torso is not visible
const LEAD_DEAD_ZONE_PX: f64 = 10.0;
/// Torso lean beyond which gait detection is not attempted
pub const MAX_GAIT_LEAN_DEG: f64 = 35.0;

/// Which foot is ahead: -1, +1, or `None` when the feet are level or not visible
pub fn leading_foot(processor: &KeypointProcessor, keypoints: &[Keypoint]) -> Option<f64> {
    let left = processor.point(keypoints, CocoKeypoint::LeftAnkle)?;
    let right = processor.point(keypoints, CocoKeypoint::RightAnkle)?;
    let dead_zone = processor
        .torso_length(keypoints)
        .map_or(LEAD_DEAD_ZONE_PX, |torso| torso * LEAD_DEAD_ZONE_RATIO);
    let offset = left.x - right.x;
    (offset.abs() > dead_zone).then(|| offset.signum())
}

/// Steps in the history window and the window span in seconds
pub fn window_steps(processor: &KeypointProcessor, history: &RingBuffer<PoseFrame>) -> (u32, f64) {
    let mut steps = 0;
    let mut lead = None;
    for frame in history.iter() {
        if let Some(current) = leading_foot(processor, &frame.keypoints) {
            if lead.is_some_and(|previous| previous != current) {
                steps += 1;
            }
            lead = Some(current);
        }
    }
    let span_s = match (history.oldest(), history.latest()) {
        (Some(first), Some(last)) => (last.timestamp_ms - first.timestamp_ms) / 1000.0,
        _ => 0.0,
    };
    (steps, span_s)
}

/// Steps per minute over the history window; needs at least two steps
pub fn window_cadence(processor: &KeypointProcessor, history: &RingBuffer<PoseFrame>) -> Option<f64> {
    let (steps, span_s) = window_steps(processor, history);
    (steps >= 2 && span_s > 0.0).then(|| steps as f64 / span_s * 60.0)
}

/// Smallest bilateral knee angle in the window
pub fn min_knee_angle(processor: &KeypointProcessor, history: &RingBuffer<PoseFrame>) -> Option<f64> {
    angle_series(processor, history, Joint::LeftKnee, Joint::RightKnee)
        .into_iter()
        .reduce(f64::min)
}

pub fn is_upright(processor: &KeypointProcessor, keypoints: &[Keypoint]) -> bool {
    processor
        .trunk_lean(keypoints)
        .is_some_and(|lean| lean.abs() < MAX_GAIT_LEAN_DEG)
}

/// Incremental step counter kept by an active gait analyzer
#[derive(Debug, Clone, Default)]
pub struct StepCounter {
    lead: Option<f64>,
    steps: u32,
}

impl StepCounter {
    pub fn update(&mut self, processor: &KeypointProcessor, keypoints: &[Keypoint]) -> u32 {
        if let Some(current) = leading_foot(processor, keypoints) {
            if self.lead.is_some_and(|previous| previous != current) {
                self.steps += 1;
            }
            self.lead = Some(current);
        }
        self.steps
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::keypoint::KEYPOINT_COUNT;

    /// Upright side-view stride; `knee_bend_px` pushes both knees forward
    pub(crate) fn stride_pose(left_leads: bool, knee_bend_px: f64) -> Vec<Keypoint> {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT];
        let mut set = |which: CocoKeypoint, x: f64, y: f64| kps[which.index()] = Keypoint::new(x, y, 0.9);
        let (left_x, right_x) = if left_leads { (380.0, 260.0) } else { (260.0, 380.0) };
        set(CocoKeypoint::LeftShoulder, 320.0, 200.0);
        set(CocoKeypoint::RightShoulder, 320.0, 200.0);
        set(CocoKeypoint::LeftHip, 320.0, 400.0);
        set(CocoKeypoint::RightHip, 320.0, 400.0);
        set(CocoKeypoint::LeftKnee, (320.0 + left_x) / 2.0 + knee_bend_px, 500.0);
        set(CocoKeypoint::RightKnee, (320.0 + right_x) / 2.0 + knee_bend_px, 500.0);
        set(CocoKeypoint::LeftAnkle, left_x, 600.0);
        set(CocoKeypoint::RightAnkle, right_x, 600.0);
        kps
    }

    /// History of alternating strides, `frames_per_step` frames each at 30 fps
    pub(crate) fn stride_history(frames_per_step: usize, frames: usize, knee_bend_px: f64) -> RingBuffer<PoseFrame> {
        let mut history = RingBuffer::new(frames);
        for i in 0..frames {
            let left_leads = (i / frames_per_step) % 2 == 0;
            history.push(PoseFrame::new(i as f64 * 1000.0 / 30.0, stride_pose(left_leads, knee_bend_px)));
        }
        history
    }

    #[test]
    fn test_window_cadence() {
        let processor = KeypointProcessor::new();
        // A step every 10 frames at 30 fps is 180 steps per minute
        let history = stride_history(10, 61, 0.0);
        let cadence = window_cadence(&processor, &history).unwrap();
        assert!((cadence - 180.0).abs() < 1e-6, "cadence {cadence}");
    }

    #[test]
    fn test_level_feet_do_not_count() {
        let processor = KeypointProcessor::new();
        let mut kps = stride_pose(true, 0.0);
        kps[CocoKeypoint::LeftAnkle.index()].x = 322.0;
        kps[CocoKeypoint::RightAnkle.index()].x = 318.0;
        assert_eq!(leading_foot(&processor, &kps), None);
    }

    #[test]
    fn test_step_counter() {
        let processor = KeypointProcessor::new();
        let mut counter = StepCounter::default();
        for left_leads in [true, true, false, true, false] {
            counter.update(&processor, &stride_pose(left_leads, 0.0));
        }
        assert_eq!(counter.steps(), 3);
    }
}
