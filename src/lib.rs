// Library exports for Motion Coach
// Pose keypoints in, exercise classification, form feedback and biomechanics out

pub mod analyzers;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use analyzers::{ExerciseAnalyzer, ExerciseDetector};
pub use config::{ConfigUpdate, EngineConfig, FilterParameterUpdate, FilterParameters};
pub use errors::{AnalysisError, MotionError};
pub use models::{AnalysisResult, ExerciseType, Keypoint, SessionStatistics};
pub use services::AnalysisEngine;
