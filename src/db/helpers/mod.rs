use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::{db::models::ReviewStatus, session::FinishReason};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Fixed-width UTC form, so stored timestamps sort and compare as text.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_review_status(value: &str) -> Result<ReviewStatus> {
    match value {
        "pending" => Ok(ReviewStatus::Pending),
        "approved" => Ok(ReviewStatus::Approved),
        "rejected" => Ok(ReviewStatus::Rejected),
        other => Err(anyhow!("unknown review status {other}")),
    }
}

pub fn parse_finish_reason(value: &str) -> Result<FinishReason> {
    match value {
        "TimeUp" => Ok(FinishReason::TimeUp),
        "Stopped" => Ok(FinishReason::Stopped),
        "SourceLost" => Ok(FinishReason::SourceLost),
        "Cancelled" => Ok(FinishReason::Cancelled),
        other => Err(anyhow!("unknown finish reason {other}")),
    }
}
