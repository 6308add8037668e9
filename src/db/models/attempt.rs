//! Journal entries for challenge attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::FinishReason;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub rep_count: u32,
    pub points: f64,
    pub status: ReviewStatus,
    pub finish_reason: FinishReason,
    pub active_secs: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A finished session about to be journaled. `started_at` becomes the
/// record's creation time and decides which day the attempt counts against,
/// so a session running past midnight belongs to the day it began.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: String,
    pub session_id: String,
    pub rep_count: u32,
    pub points: f64,
    pub finish_reason: FinishReason,
    pub active_secs: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum ReviewDecision {
    /// Accept the attempt, possibly with a corrected rep count.
    Approve { rep_count: u32 },
    /// Void the attempt; it keeps counting toward the daily cap.
    Reject,
}

impl ReviewDecision {
    pub fn status(&self) -> ReviewStatus {
        match self {
            ReviewDecision::Approve { .. } => ReviewStatus::Approved,
            ReviewDecision::Reject => ReviewStatus::Rejected,
        }
    }

    pub fn rep_count(&self) -> u32 {
        match self {
            ReviewDecision::Approve { rep_count } => *rep_count,
            ReviewDecision::Reject => 0,
        }
    }
}
