use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{
        format_timestamp, parse_datetime, parse_finish_reason, parse_review_status, to_i64,
        to_u32, to_u64,
    },
    models::{AttemptRecord, NewAttempt, ReviewStatus},
};

const ATTEMPT_COLUMNS: &str = "id, user_id, session_id, rep_count, points, status, finish_reason, active_secs, created_at, updated_at";

fn row_to_attempt(row: &Row) -> Result<AttemptRecord> {
    let rep_count: i64 = row.get("rep_count")?;
    let active_secs: i64 = row.get("active_secs")?;
    let status: String = row.get("status")?;
    let finish_reason: String = row.get("finish_reason")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(AttemptRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        session_id: row.get("session_id")?,
        rep_count: to_u32(rep_count, "rep_count")?,
        points: row.get("points")?,
        status: parse_review_status(&status)?,
        finish_reason: parse_finish_reason(&finish_reason)?,
        active_secs: to_u32(active_secs, "active_secs")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn select_attempt(conn: &Connection, attempt_id: &str) -> Result<Option<AttemptRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![attempt_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_attempt(row)?)),
        None => Ok(None),
    }
}

impl Database {
    /// Journal a finished session as a pending attempt.
    pub async fn insert_attempt(&self, attempt: &NewAttempt) -> Result<AttemptRecord> {
        // Stored at millisecond precision; keep the returned copy identical.
        let started_at = attempt.started_at.trunc_subsecs(3);
        let finished_at = attempt.finished_at.trunc_subsecs(3);
        let record = AttemptRecord {
            id: Uuid::new_v4().to_string(),
            user_id: attempt.user_id.clone(),
            session_id: attempt.session_id.clone(),
            rep_count: attempt.rep_count,
            points: attempt.points,
            status: ReviewStatus::Pending,
            finish_reason: attempt.finish_reason,
            active_secs: attempt.active_secs,
            created_at: started_at,
            updated_at: finished_at,
        };

        let row = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO attempts (id, user_id, session_id, rep_count, points, status, finish_reason, active_secs, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    row.id,
                    row.user_id,
                    row.session_id,
                    to_i64(u64::from(row.rep_count))?,
                    row.points,
                    row.status.as_str(),
                    row.finish_reason.as_str(),
                    to_i64(u64::from(row.active_secs))?,
                    format_timestamp(&row.created_at),
                    format_timestamp(&row.updated_at),
                ],
            )
            .context("failed to insert attempt")?;
            Ok(())
        })
        .await?;

        Ok(record)
    }

    /// Attempts by `user_id` created in `[from, to)`.
    pub async fn count_attempts_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM attempts
                     WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3",
                    params![user_id, format_timestamp(&from), format_timestamp(&to)],
                    |row| row.get(0),
                )
                .context("failed to count attempts")?;
            to_u32(count, "attempt count")
        })
        .await
    }

    /// Every attempt by `user_id`, newest first.
    pub async fn attempt_history(&self, user_id: &str) -> Result<Vec<AttemptRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ATTEMPT_COLUMNS} FROM attempts
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;

            let mut rows = stmt.query(params![user_id])?;
            let mut attempts = Vec::new();
            while let Some(row) = rows.next()? {
                attempts.push(row_to_attempt(row)?);
            }
            Ok(attempts)
        })
        .await
    }

    pub async fn get_attempt(&self, attempt_id: &str) -> Result<Option<AttemptRecord>> {
        let attempt_id = attempt_id.to_string();
        self.execute(move |conn| select_attempt(conn, &attempt_id))
            .await
    }

    /// Record a review verdict. Returns `None` when no such attempt exists.
    pub async fn update_attempt_review(
        &self,
        attempt_id: &str,
        status: ReviewStatus,
        rep_count: u32,
        points: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<AttemptRecord>> {
        let attempt_id = attempt_id.to_string();
        self.execute(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE attempts
                     SET status = ?1,
                         rep_count = ?2,
                         points = ?3,
                         updated_at = ?4
                     WHERE id = ?5",
                    params![
                        status.as_str(),
                        to_i64(u64::from(rep_count))?,
                        points,
                        format_timestamp(&updated_at),
                        attempt_id,
                    ],
                )
                .context("failed to update attempt review")?;

            if changed == 0 {
                return Ok(None);
            }
            select_attempt(conn, &attempt_id)
        })
        .await
    }

    /// Distinct users with at least one attempt.
    pub async fn participant_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: Option<i64> = conn
                .query_row("SELECT COUNT(DISTINCT user_id) FROM attempts", [], |row| {
                    row.get(0)
                })
                .optional()
                .context("failed to count participants")?;
            to_u64(count.unwrap_or(0), "participant count")
        })
        .await
    }
}
