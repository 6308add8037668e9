use thiserror::Error;

/// Failures surfaced to the caller. Everything that can go wrong once a
/// session is running is absorbed by the session itself.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("pose detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("daily attempt limit reached: {used} of {limit} used")]
    AttemptLimitReached { used: u32, limit: u32 },

    #[error("attempt history unavailable: {0}")]
    History(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
