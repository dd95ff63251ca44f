/// Adaptive low-latency smoothing of keypoint coordinates
///
/// Each of the 34 scalar channels (17 keypoints × 2 axes) runs its own
/// One-Euro filter: smooth at rest (reduces jitter), responsive when the
/// signal moves fast. Channel state lives in a fixed array indexed by
/// `(keypoint, axis)` and is created lazily on the first confident sample.
use serde::Serialize;
use std::f64::consts::PI;
use tracing::{debug, warn};

use crate::config::filter::{FilterParameterUpdate, FilterParameters};
use crate::errors::MotionError;
use crate::models::keypoint::{Keypoint, KEYPOINT_COUNT};

/// Number of scalar channels (keypoints × axes)
pub const CHANNEL_COUNT: usize = KEYPOINT_COUNT * 2;

/// Gap, in nominal sampling periods, after which a channel restarts from the raw value
pub const STALE_GAP_PERIODS: f64 = 30.0;
/// The stale gap is never shorter than this, whatever the nominal frequency
pub const MIN_STALE_GAP_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    Y = 1,
}

/// Channel slot for a keypoint coordinate
pub fn channel_index(keypoint_index: usize, axis: Axis) -> usize {
    keypoint_index * 2 + axis as usize
}

/// Per-channel filter state
#[derive(Debug, Clone, Copy, PartialEq)]
struct FilterState {
    /// Last filtered value
    value: f64,
    /// Last smoothed derivative estimate (units per second)
    derivative: f64,
    /// Timestamp of the last sample (ms)
    timestamp_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelError {
    NonFinite,
}

/// Counters describing filter bank activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub frames_filtered: u64,
    pub channels_bootstrapped: u64,
    pub channels_substituted: u64,
    pub parameter_resets: u64,
}

/// One-Euro filter bank over all keypoint channels
#[derive(Debug, Clone)]
pub struct FilterBank {
    params: FilterParameters,
    enabled: bool,
    min_confidence: f64,
    channels: [Option<FilterState>; CHANNEL_COUNT],
    stats: FilterStats,
}

impl FilterBank {
    /// Create a filter bank with default parameters
    pub fn new() -> Self {
        Self {
            params: FilterParameters::default(),
            enabled: true,
            min_confidence: 0.3,
            channels: [None; CHANNEL_COUNT],
            stats: FilterStats::default(),
        }
    }

    /// Create a filter bank with custom parameters
    pub fn with_parameters(params: FilterParameters) -> Result<Self, MotionError> {
        params.validate()?;
        Ok(Self {
            params: params.clamped(),
            ..Self::new()
        })
    }

    /// Set minimum confidence threshold for filtered keypoints
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn set_min_confidence(&mut self, min_confidence: f64) {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
    }

    pub fn parameters(&self) -> &FilterParameters {
        &self.params
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    /// Number of channels currently holding filter state
    pub fn active_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.is_some()).count()
    }

    /// Smooth one frame of keypoints.
    ///
    /// Keypoints below the confidence threshold pass through untouched and do
    /// not update their channel. A channel that produces a non-finite value
    /// is restarted and its raw value substituted; the rest of the frame is
    /// still filtered.
    pub fn filter_frame(&mut self, keypoints: &[Keypoint], timestamp_ms: f64) -> Vec<Keypoint> {
        if !self.enabled {
            return keypoints.to_vec();
        }

        self.stats.frames_filtered += 1;

        keypoints
            .iter()
            .enumerate()
            .map(|(index, kp)| {
                if index >= KEYPOINT_COUNT || !kp.is_valid(self.min_confidence) {
                    return *kp;
                }
                Keypoint {
                    x: self.filter_channel(channel_index(index, Axis::X), kp.x, timestamp_ms),
                    y: self.filter_channel(channel_index(index, Axis::Y), kp.y, timestamp_ms),
                    score: kp.score,
                }
            })
            .collect()
    }

    fn filter_channel(&mut self, channel: usize, raw: f64, timestamp_ms: f64) -> f64 {
        match self.step(channel, raw, timestamp_ms) {
            Ok(value) => value,
            Err(ChannelError::NonFinite) => {
                warn!("Filter channel {} produced a non-finite value, using raw sample", channel);
                self.channels[channel] = None;
                self.stats.channels_substituted += 1;
                raw
            }
        }
    }

    fn step(&mut self, channel: usize, raw: f64, timestamp_ms: f64) -> Result<f64, ChannelError> {
        let state = match self.channels[channel] {
            Some(state) => state,
            None => return Ok(self.bootstrap(channel, raw, timestamp_ms)),
        };

        let elapsed_ms = timestamp_ms - state.timestamp_ms;
        if !(elapsed_ms > 0.0) {
            // Duplicate or out-of-order timestamp: no new information
            return Ok(state.value);
        }

        if elapsed_ms > self.stale_gap_ms() {
            return Ok(self.bootstrap(channel, raw, timestamp_ms));
        }

        let t_e = elapsed_ms / 1000.0;

        // 1. Estimate derivative (velocity)
        let a_d = smoothing_factor(t_e, self.params.d_cutoff);
        let dx = (raw - state.value) / t_e;
        let dx_hat = a_d * dx + (1.0 - a_d) * state.derivative;

        // 2. Adaptive cutoff: more smoothing when slow, less when fast
        let cutoff = self.params.min_cutoff + self.params.beta * dx_hat.abs();
        let a = smoothing_factor(t_e, cutoff);

        // 3. Apply filter
        let x_hat = a * raw + (1.0 - a) * state.value;

        if !x_hat.is_finite() || !dx_hat.is_finite() {
            return Err(ChannelError::NonFinite);
        }

        self.channels[channel] = Some(FilterState {
            value: x_hat,
            derivative: dx_hat,
            timestamp_ms,
        });
        Ok(x_hat)
    }

    fn stale_gap_ms(&self) -> f64 {
        let nominal_period_ms = 1000.0 / self.params.frequency;
        (STALE_GAP_PERIODS * nominal_period_ms).max(MIN_STALE_GAP_MS)
    }

    fn bootstrap(&mut self, channel: usize, raw: f64, timestamp_ms: f64) -> f64 {
        if !raw.is_finite() {
            return raw;
        }
        self.channels[channel] = Some(FilterState {
            value: raw,
            derivative: 0.0,
            timestamp_ms,
        });
        self.stats.channels_bootstrapped += 1;
        raw
    }

    /// Validate and apply new parameters.
    ///
    /// Out-of-range or non-finite values reject the whole update, listing every
    /// violated bound, and leave the current parameters in place. When the
    /// accepted parameters differ from the current ones all channel state is
    /// cleared. Returns whether anything changed.
    pub fn update_parameters(&mut self, update: &FilterParameterUpdate) -> Result<bool, MotionError> {
        let candidate = self.params.merged(update);
        candidate.validate()?;
        let candidate = candidate.clamped();

        if candidate == self.params {
            return Ok(false);
        }

        debug!(
            "Filter parameters changed ({:?} -> {:?}), clearing channel state",
            self.params, candidate
        );
        self.params = candidate;
        self.stats.parameter_resets += 1;
        self.reset();
        Ok(true)
    }

    /// Enable or disable filtering; disabling clears all state
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.reset();
        }
        self.enabled = enabled;
    }

    /// Reset all channel state
    pub fn reset(&mut self) {
        self.channels = [None; CHANNEL_COUNT];
    }
}

impl Default for FilterBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-pole low-pass smoothing factor for a sampling interval and cutoff
fn smoothing_factor(t_e: f64, cutoff: f64) -> f64 {
    let r = 2.0 * PI * cutoff * t_e;
    r / (r + 1.0)
}
