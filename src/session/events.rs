use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{Feedback, RepPhase},
    pose::CameraFacing,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Countdown,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    TimeUp,
    Stopped,
    /// The camera stream ended or could not be reacquired.
    SourceLost,
    Cancelled,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::TimeUp => "TimeUp",
            FinishReason::Stopped => "Stopped",
            FinishReason::SourceLost => "SourceLost",
            FinishReason::Cancelled => "Cancelled",
        }
    }

    /// Whether a session that reached the active window and finished this
    /// way is handed to the completion callback.
    pub fn reports_result(&self) -> bool {
        !matches!(self, FinishReason::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: SessionPhase,
    pub countdown_remaining_secs: u32,
    pub active_remaining_secs: u32,
    pub rep_count: u32,
    pub rep_phase: RepPhase,
    pub feedback: Feedback,
    pub facing: CameraFacing,
}

impl SessionSnapshot {
    pub fn feedback_message(&self) -> &'static str {
        self.feedback.message()
    }
}

/// Terminal result of a session, produced exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub session_id: String,
    pub rep_count: u32,
    pub reason: FinishReason,
    pub active_elapsed_secs: u32,
    /// False when the session ended before the countdown ran out.
    pub reached_active: bool,
    pub finished_at: DateTime<Utc>,
}

impl SessionOutcome {
    /// Only attempts that got to count are reported; losing the camera
    /// during the countdown costs nothing.
    pub fn reports_result(&self) -> bool {
        self.reached_active && self.reason.reports_result()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SessionEvent {
    StateChanged(SessionSnapshot),
    Finished(SessionOutcome),
}
