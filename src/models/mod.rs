// Data models shared by the filtering, analysis and biomechanics services

pub mod analysis;
pub mod biomechanics;
pub mod body;
pub mod history;
pub mod keypoint;
pub mod validation;

pub use analysis::*;
pub use biomechanics::*;
pub use body::*;
pub use history::RingBuffer;
pub use keypoint::*;
pub use validation::*;
