use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use motion_coach::models::{Keypoint, KEYPOINT_COUNT};

/// Recording-specific errors; line numbers are 1-based
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Frame on line {line} has {found} keypoints, expected {}", KEYPOINT_COUNT)]
    KeypointCount { line: usize, found: usize },

    #[error("Keypoint {index} on line {line} has confidence {score}, expected a value in [0, 1]")]
    InvalidConfidence { line: usize, index: usize, score: f64 },

    #[error("Recording contains no frames")]
    Empty,
}

/// One line of a JSON-lines recording
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordedFrame {
    pub timestamp_ms: f64,

    /// Seconds since the previous frame; derived from timestamps when absent
    #[serde(default)]
    pub delta_time: Option<f64>,

    pub keypoints: Vec<Keypoint>,
}

/// Parse a JSON-lines recording, skipping blank lines and `#` comments
pub fn parse_recording(reader: impl BufRead) -> Result<Vec<RecordedFrame>, RecordingError> {
    let mut frames = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let frame: RecordedFrame = serde_json::from_str(trimmed).map_err(|source| RecordingError::Parse {
            line: line_number,
            source,
        })?;
        if frame.keypoints.len() != KEYPOINT_COUNT {
            return Err(RecordingError::KeypointCount {
                line: line_number,
                found: frame.keypoints.len(),
            });
        }
        validate_confidence(&frame.keypoints, line_number)?;

        frames.push(frame);
    }

    if frames.is_empty() {
        return Err(RecordingError::Empty);
    }
    Ok(frames)
}

/// Reject confidence scores outside [0, 1]; positions are left to the engine
pub fn validate_confidence(keypoints: &[Keypoint], line: usize) -> Result<(), RecordingError> {
    match keypoints
        .iter()
        .enumerate()
        .find(|(_, kp)| !(0.0..=1.0).contains(&kp.score))
    {
        Some((index, kp)) => Err(RecordingError::InvalidConfidence {
            line,
            index,
            score: kp.score,
        }),
        None => Ok(()),
    }
}

/// Open and parse a recording file
pub fn read_recording(path: &Path) -> Result<Vec<RecordedFrame>> {
    let file = File::open(path).with_context(|| format!("Failed to open recording {}", path.display()))?;
    let frames = parse_recording(BufReader::new(file))
        .with_context(|| format!("Failed to load recording {}", path.display()))?;
    tracing::debug!("Loaded {} frames from {}", frames.len(), path.display());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame_line(timestamp_ms: f64, score: f64) -> String {
        let keypoints: Vec<String> = (0..KEYPOINT_COUNT)
            .map(|i| format!(r#"{{"x": {}, "y": {}, "score": {}}}"#, 100 + i, 200 + i, score))
            .collect();
        format!(r#"{{"timestamp_ms": {}, "keypoints": [{}]}}"#, timestamp_ms, keypoints.join(","))
    }

    #[test]
    fn test_parses_frames_and_skips_comments() {
        let input = format!("# recorded at 30 fps\n{}\n\n{}\n", frame_line(0.0, 0.9), frame_line(33.3, 0.8));
        let frames = parse_recording(Cursor::new(input)).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].timestamp_ms, 33.3);
        assert_eq!(frames[1].delta_time, None);
        assert_eq!(frames[0].keypoints[3], Keypoint::new(103.0, 203.0, 0.9));
    }

    #[test]
    fn test_reports_line_of_bad_json() {
        let input = format!("{}\nnot json\n", frame_line(0.0, 0.9));
        let err = parse_recording(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, RecordingError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_rejects_wrong_keypoint_count() {
        let input = r#"{"timestamp_ms": 0, "keypoints": [{"x": 1, "y": 2, "score": 0.5}]}"#;
        let err = parse_recording(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, RecordingError::KeypointCount { line: 1, found: 1 }));
    }

    #[test]
    fn test_rejects_confidence_out_of_range() {
        let err = parse_recording(Cursor::new(frame_line(0.0, 1.5))).unwrap_err();
        assert!(matches!(err, RecordingError::InvalidConfidence { line: 1, index: 0, .. }));
    }

    #[test]
    fn test_empty_recording() {
        let err = parse_recording(Cursor::new("\n# nothing\n")).unwrap_err();
        assert!(matches!(err, RecordingError::Empty));
    }
}
