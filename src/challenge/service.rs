use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Days, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::sync::oneshot;

use crate::{
    db::{AttemptRecord, NewAttempt, ReviewDecision},
    scoring::{derive_points, evaluate_eligibility, Eligibility, ScoringConfig},
    session::{
        start_session, CompletionCallback, PoseFeed, SessionConfig, SessionError, SessionHandle,
    },
};

use super::journal::AttemptJournal;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Gate, session and journal for one challenge: refuses over-cap attempts,
/// runs the session and journals its result as a pending attempt.
#[derive(Clone)]
pub struct ChallengeService {
    journal: Arc<dyn AttemptJournal>,
    scoring: ScoringConfig,
}

/// A running challenge session plus the journal entry it will produce.
pub struct ChallengeAttempt {
    session: SessionHandle,
    recorded: oneshot::Receiver<Option<AttemptRecord>>,
}

impl ChallengeAttempt {
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Waits for the session to end. `None` if it was cancelled, lost its
    /// camera before counting started, or the journal write failed.
    pub async fn recorded(self) -> Option<AttemptRecord> {
        self.recorded.await.ok().flatten()
    }
}

impl ChallengeService {
    pub fn new(journal: Arc<dyn AttemptJournal>, scoring: ScoringConfig) -> Self {
        Self { journal, scoring }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub async fn eligibility(&self, user_id: &str) -> Result<Eligibility, SessionError> {
        let (from, to) = day_bounds(&Local::now());
        let used = self
            .journal
            .count_attempts_between(user_id, from, to)
            .await
            .map_err(|err| {
                log_error!("failed to read attempt history for {user_id}: {err:?}");
                SessionError::History(format!("{err:#}"))
            })?;
        Ok(evaluate_eligibility(used, &self.scoring))
    }

    pub async fn begin_attempt(
        &self,
        user_id: &str,
        config: SessionConfig,
        feed: PoseFeed,
    ) -> Result<ChallengeAttempt, SessionError> {
        let eligibility = self.eligibility(user_id).await?;
        if !eligibility.allowed {
            log_info!(
                "refusing attempt for {user_id}: {} of {} used today",
                eligibility.attempts_used,
                eligibility.limit
            );
            return Err(SessionError::AttemptLimitReached {
                used: eligibility.attempts_used,
                limit: eligibility.limit,
            });
        }

        let (record_tx, record_rx) = oneshot::channel();
        let journal = Arc::clone(&self.journal);
        let points_per_rep = self.scoring.points_per_rep;
        let user_id = user_id.to_string();
        let started_at = Utc::now();

        let on_complete: CompletionCallback = Box::new(move |outcome| {
            let attempt = NewAttempt {
                user_id,
                session_id: outcome.session_id,
                rep_count: outcome.rep_count,
                points: derive_points(outcome.rep_count, points_per_rep),
                finish_reason: outcome.reason,
                active_secs: outcome.active_elapsed_secs,
                started_at,
                finished_at: outcome.finished_at,
            };

            tokio::spawn(async move {
                let recorded = match journal.record_attempt(attempt).await {
                    Ok(record) => {
                        log_info!(
                            "attempt {} recorded: {} reps, {} points",
                            record.id,
                            record.rep_count,
                            record.points
                        );
                        Some(record)
                    }
                    Err(err) => {
                        log_error!("failed to record attempt: {err:?}");
                        None
                    }
                };
                let _ = record_tx.send(recorded);
            });
        });

        let session = start_session(config, feed, on_complete).await?;
        Ok(ChallengeAttempt {
            session,
            recorded: record_rx,
        })
    }

    /// Apply a reviewer's verdict. Points follow the reviewed rep count.
    pub async fn review_attempt(
        &self,
        attempt_id: &str,
        decision: ReviewDecision,
    ) -> Result<Option<AttemptRecord>> {
        let rep_count = decision.rep_count();
        let points = derive_points(rep_count, self.scoring.points_per_rep);
        self.journal
            .set_review(attempt_id, decision.status(), rep_count, points)
            .await
    }

    pub async fn attempt_history(&self, user_id: &str) -> Result<Vec<AttemptRecord>> {
        self.journal.attempt_history(user_id).await
    }

    pub async fn participant_count(&self) -> Result<u64> {
        self.journal.participant_count().await
    }
}

/// `[start, end)` in UTC of the calendar day `now` falls on, in `now`'s zone.
pub fn day_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let zone = now.timezone();
    let today = now.date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
    (start_of_day(&zone, today), start_of_day(&zone, tomorrow))
}

fn start_of_day<Tz: TimeZone>(zone: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    match zone.from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        // Midnight skipped by a DST jump; the day starts at the first valid hour.
        None => zone
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|start| start.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}
