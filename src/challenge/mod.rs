mod journal;
mod service;

pub use journal::AttemptJournal;
pub use service::{day_bounds, ChallengeAttempt, ChallengeService};
