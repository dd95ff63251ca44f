/// Kinematics tracking over consecutive filtered frames
///
/// Keeps a bounded window of positions per keypoint and derives velocity,
/// acceleration, a jerk-based smoothness score and a coarse motion pattern.
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use crate::models::analysis::{MotionPattern, MotionSummary};
use crate::models::history::RingBuffer;
use crate::models::keypoint::{Keypoint, Point2, Vector2, KEYPOINT_COUNT};

/// Minimum acceleration samples for a smoothness estimate
pub const MIN_SMOOTHNESS_SAMPLES: usize = 3;
/// Minimum positions for a motion pattern
pub const MIN_PATTERN_SAMPLES: usize = 5;
/// Positional spread (px) below which a keypoint is considered static
pub const STATIC_SPREAD_PX: f64 = 3.0;
/// Net displacement / path length above which motion is linear
const LINEARITY_THRESHOLD: f64 = 0.8;
/// Steps shorter than this (px) do not count as direction changes
const REVERSAL_DEAD_ZONE_PX: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct Sample {
    position: Point2,
    timestamp_ms: f64,
}

#[derive(Debug, Clone)]
struct KeypointTrack {
    positions: RingBuffer<Sample>,
    velocities: RingBuffer<Vector2>,
    accelerations: RingBuffer<Vector2>,
}

impl KeypointTrack {
    fn new(window: usize) -> Self {
        Self {
            positions: RingBuffer::new(window),
            velocities: RingBuffer::new(window),
            accelerations: RingBuffer::new(window),
        }
    }

    fn set_window(&mut self, window: usize) {
        self.positions.set_capacity(window);
        self.velocities.set_capacity(window);
        self.accelerations.set_capacity(window);
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.velocities.clear();
        self.accelerations.clear();
    }

    fn push(&mut self, position: Point2, timestamp_ms: f64, fallback_dt_s: f64) {
        let sample = Sample { position, timestamp_ms };

        let Some(previous) = self.positions.latest().copied() else {
            self.positions.push(sample);
            return;
        };

        let elapsed_s = (timestamp_ms - previous.timestamp_ms) / 1000.0;
        let dt = if elapsed_s > 0.0 {
            elapsed_s
        } else if fallback_dt_s > 0.0 && fallback_dt_s.is_finite() && timestamp_ms != previous.timestamp_ms {
            fallback_dt_s
        } else {
            // Duplicate sample: keep the previous estimates
            return;
        };

        let velocity = Vector2::new(
            (position.x - previous.position.x) / dt,
            (position.y - previous.position.y) / dt,
        );
        if let Some(last_velocity) = self.velocities.latest().copied() {
            self.accelerations.push(Vector2::new(
                (velocity.x - last_velocity.x) / dt,
                (velocity.y - last_velocity.y) / dt,
            ));
        }
        self.velocities.push(velocity);
        self.positions.push(sample);
    }
}

/// Per-keypoint velocity/acceleration tracker
#[derive(Debug, Clone)]
pub struct KinematicsTracker {
    tracks: Vec<KeypointTrack>,
    window: usize,
    min_confidence: f64,
}

impl KinematicsTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(MIN_PATTERN_SAMPLES);
        Self {
            tracks: (0..KEYPOINT_COUNT).map(|_| KeypointTrack::new(window)).collect(),
            window,
            min_confidence: 0.3,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn set_min_confidence(&mut self, min_confidence: f64) {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Resize every per-keypoint window, dropping the oldest samples
    pub fn set_window(&mut self, window: usize) {
        self.window = window.max(MIN_PATTERN_SAMPLES);
        for track in &mut self.tracks {
            track.set_window(self.window);
        }
    }

    /// Ingest one frame.
    ///
    /// The time step for each keypoint is the gap to its previous retained
    /// sample; `delta_time_s` is used when that gap is not positive. Missing
    /// keypoints keep their last estimates.
    pub fn update(&mut self, keypoints: &[Keypoint], timestamp_ms: f64, delta_time_s: f64) {
        for (track, kp) in self.tracks.iter_mut().zip(keypoints.iter()) {
            if kp.is_valid(self.min_confidence) {
                track.push(kp.position(), timestamp_ms, delta_time_s);
            }
        }
    }

    /// Last velocity (px/s), `None` with fewer than two samples
    pub fn velocity(&self, index: usize) -> Option<Vector2> {
        self.tracks.get(index)?.velocities.latest().copied()
    }

    /// Last acceleration (px/s²), `None` with fewer than two velocity samples
    pub fn acceleration(&self, index: usize) -> Option<Vector2> {
        self.tracks.get(index)?.accelerations.latest().copied()
    }

    /// Highest speed in the retained window
    pub fn peak_speed(&self, index: usize) -> Option<f64> {
        let velocities = &self.tracks.get(index)?.velocities;
        if velocities.is_empty() {
            return None;
        }
        Some(velocities.iter().fold(0.0_f64, |peak, v| peak.max(v.magnitude)))
    }

    /// Normalized variance of acceleration magnitude over the window; lower is smoother
    pub fn smoothness(&self, index: usize) -> Option<f64> {
        let accelerations = &self.tracks.get(index)?.accelerations;
        if accelerations.len() < MIN_SMOOTHNESS_SAMPLES {
            return None;
        }

        let magnitudes: Vec<f64> = accelerations.iter().map(|a| a.magnitude).collect();
        let mean = magnitudes.iter().mean();
        if mean < 1e-9 {
            return Some(0.0);
        }
        let variance = magnitudes.iter().population_variance();
        Some(variance / (mean * mean))
    }

    /// Classify the retained trajectory of a keypoint
    pub fn motion_pattern(&self, index: usize) -> Option<MotionPattern> {
        let positions = &self.tracks.get(index)?.positions;
        if positions.len() < MIN_PATTERN_SAMPLES {
            return None;
        }

        let xs: Vec<f64> = positions.iter().map(|s| s.position.x).collect();
        let ys: Vec<f64> = positions.iter().map(|s| s.position.y).collect();
        let var_x = xs.iter().population_variance();
        let var_y = ys.iter().population_variance();

        if (var_x + var_y).sqrt() < STATIC_SPREAD_PX {
            return Some(MotionPattern::Static);
        }

        let path_length: f64 = positions
            .iter()
            .zip(positions.iter().skip(1))
            .map(|(a, b)| a.position.distance_to(&b.position))
            .sum();
        let net = match (positions.oldest(), positions.latest()) {
            (Some(first), Some(last)) => first.position.distance_to(&last.position),
            _ => 0.0,
        };
        if path_length > 0.0 && net / path_length >= LINEARITY_THRESHOLD {
            return Some(MotionPattern::Linear);
        }

        let dominant = if var_x >= var_y { &xs } else { &ys };
        if count_reversals(dominant) >= 2 {
            Some(MotionPattern::Oscillatory)
        } else {
            Some(MotionPattern::Irregular)
        }
    }

    /// Whole-body summary over all tracked keypoints
    pub fn summary(&self) -> Option<MotionSummary> {
        let speeds: Vec<f64> = (0..KEYPOINT_COUNT)
            .filter_map(|i| self.velocity(i))
            .map(|v| v.magnitude)
            .collect();
        if speeds.is_empty() {
            return None;
        }

        let mut pattern_counts: BTreeMap<MotionPattern, usize> = BTreeMap::new();
        for pattern in (0..KEYPOINT_COUNT).filter_map(|i| self.motion_pattern(i)) {
            *pattern_counts.entry(pattern).or_default() += 1;
        }
        let dominant_pattern = pattern_counts
            .iter()
            .fold(None, |best: Option<(MotionPattern, usize)>, (pattern, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((*pattern, *count)),
            })
            .map(|(pattern, _)| pattern);

        let smoothness: Vec<f64> = (0..KEYPOINT_COUNT).filter_map(|i| self.smoothness(i)).collect();

        Some(MotionSummary {
            average_speed: speeds.iter().mean(),
            peak_speed: speeds.iter().fold(0.0_f64, |a, b| a.max(*b)),
            dominant_pattern,
            smoothness: (!smoothness.is_empty()).then(|| smoothness.iter().mean()),
        })
    }

    /// Clear all per-keypoint history
    pub fn reset(&mut self) {
        for track in &mut self.tracks {
            track.clear();
        }
    }
}

impl Default for KinematicsTracker {
    fn default() -> Self {
        Self::new(30)
    }
}

/// Direction changes along a 1D series, ignoring steps inside the dead zone
fn count_reversals(values: &[f64]) -> usize {
    let mut reversals = 0;
    let mut last_sign = 0.0;
    for pair in values.windows(2) {
        let step = pair[1] - pair[0];
        if step.abs() < REVERSAL_DEAD_ZONE_PX {
            continue;
        }
        let sign = step.signum();
        if last_sign != 0.0 && sign != last_sign {
            reversals += 1;
        }
        last_sign = sign;
    }
    reversals
}
