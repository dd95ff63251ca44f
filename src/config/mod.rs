// Engine and filter configuration

pub mod engine;
pub mod filter;

pub use engine::{ConfigUpdate, EngineConfig, MAX_HISTORY_CAP};
pub use filter::{FilterParameterUpdate, FilterParameters, MAX_FREQUENCY, MIN_FREQUENCY};
