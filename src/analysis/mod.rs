pub mod angles;
pub mod rep_counter;

pub use angles::{extract_angles, joint_angle, AngleSample};
pub use rep_counter::{CountingMode, Feedback, RepCounter, RepPhase, RepRules, RepUpdate};
