pub mod attempt;

pub use attempt::{AttemptRecord, NewAttempt, ReviewDecision, ReviewStatus};
