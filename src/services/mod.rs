// Frame-processing services

pub mod analysis_engine;
pub mod biomechanics_service;
pub mod filter_bank;
pub mod keypoint_processor;
pub mod kinematics_tracker;

pub use analysis_engine::{AnalysisEngine, EngineState};
pub use biomechanics_service::BiomechanicsEngine;
pub use filter_bank::{FilterBank, FilterStats};
pub use keypoint_processor::KeypointProcessor;
pub use kinematics_tracker::KinematicsTracker;
