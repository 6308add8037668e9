use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{AttemptRecord, Database, NewAttempt, ReviewStatus};

/// Where finished attempts are kept and where the daily cap is read from.
#[async_trait]
pub trait AttemptJournal: Send + Sync {
    async fn count_attempts_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32>;

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord>;

    async fn attempt_history(&self, user_id: &str) -> Result<Vec<AttemptRecord>>;

    async fn set_review(
        &self,
        attempt_id: &str,
        status: ReviewStatus,
        rep_count: u32,
        points: f64,
    ) -> Result<Option<AttemptRecord>>;

    async fn participant_count(&self) -> Result<u64>;
}

#[async_trait]
impl AttemptJournal for Database {
    async fn count_attempts_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32> {
        Database::count_attempts_between(self, user_id, from, to).await
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord> {
        self.insert_attempt(&attempt).await
    }

    async fn attempt_history(&self, user_id: &str) -> Result<Vec<AttemptRecord>> {
        Database::attempt_history(self, user_id).await
    }

    async fn set_review(
        &self,
        attempt_id: &str,
        status: ReviewStatus,
        rep_count: u32,
        points: f64,
    ) -> Result<Option<AttemptRecord>> {
        self.update_attempt_review(attempt_id, status, rep_count, points, Utc::now())
            .await
    }

    async fn participant_count(&self) -> Result<u64> {
        Database::participant_count(self).await
    }
}
