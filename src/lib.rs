//! Camera-driven push-up counting.
//!
//! Frames flow from a [`pose::FrameSource`] through a [`pose::PoseDetector`],
//! the elbow-angle extractor and the rep state machine into a timed session
//! (5 s countdown, 60 s counting window). Finished sessions are scored and
//! journaled behind a daily attempt cap.

pub mod analysis;
pub mod challenge;
pub mod db;
pub mod metrics;
pub mod pose;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::info;

pub use challenge::{AttemptJournal, ChallengeAttempt, ChallengeService};
pub use db::{AttemptRecord, Database, ReviewDecision, ReviewStatus};
pub use scoring::{check_eligibility, derive_points, evaluate_eligibility, Eligibility, ScoringConfig};
pub use session::{
    start_session, FinishReason, PoseFeed, SessionConfig, SessionError, SessionEvent,
    SessionHandle, SessionOutcome, SessionPhase, SessionSnapshot,
};
pub use settings::{CounterSettings, SettingsStore};
pub use utils::init_logging;

const DATABASE_FILE: &str = "pushup-counter.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Everything a host app needs, rooted in one data directory.
pub struct CounterApp {
    data_dir: PathBuf,
    db: Database,
    settings: SettingsStore,
}

impl CounterApp {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).with_context(|| {
            format!("failed to create data directory {}", data_dir.display())
        })?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;

        info!("Push-up counter ready in {}", data_dir.display());

        Ok(Self {
            data_dir,
            db,
            settings,
        })
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// A challenge service using the scoring settings as they are now.
    pub fn challenge(&self) -> ChallengeService {
        ChallengeService::new(Arc::new(self.db.clone()), self.settings.scoring())
    }

    /// Start an attempt with the stored session settings.
    pub async fn begin_attempt(
        &self,
        user_id: &str,
        feed: PoseFeed,
    ) -> Result<ChallengeAttempt, SessionError> {
        self.challenge()
            .begin_attempt(user_id, self.settings.session(), feed)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_the_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("profile");

        let app = CounterApp::open(&root).unwrap();
        assert!(root.join(DATABASE_FILE).exists());
        assert_eq!(app.data_dir(), root.as_path());
        assert_eq!(app.challenge().scoring(), &ScoringConfig::default());
    }

    #[tokio::test]
    async fn stored_settings_drive_new_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let app = CounterApp::open(dir.path()).unwrap();
        app.settings()
            .update_session(SessionConfig {
                countdown_secs: 0,
                ..SessionConfig::default()
            })
            .unwrap();
        app.settings()
            .update_scoring(ScoringConfig {
                points_per_rep: 1.0,
                max_attempts_per_day: 1,
            })
            .unwrap();

        let attempt = app.begin_attempt("alex", PoseFeed::External).await.unwrap();
        assert_eq!(attempt.session().snapshot().await.phase, SessionPhase::Active);
        attempt.session().stop().await.unwrap();
        assert!(attempt.recorded().await.is_some());

        let refused = app.begin_attempt("alex", PoseFeed::External).await;
        assert!(matches!(
            refused,
            Err(SessionError::AttemptLimitReached { used: 1, limit: 1 })
        ));
    }
}
