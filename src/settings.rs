use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    scoring::ScoringConfig,
    session::{SessionConfig, SessionError},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CounterSettings {
    pub session: SessionConfig,
    pub scoring: ScoringConfig,
}

impl CounterSettings {
    pub fn validate(&self) -> Result<(), SessionError> {
        self.session.validate()?;
        self.scoring.validate()
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CounterSettings>,
}

impl SettingsStore {
    /// Load from `path`. A missing or unreadable file means defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<CounterSettings>(&contents) {
                Ok(data) => match data.validate() {
                    Ok(()) => data,
                    Err(err) => {
                        warn!("Ignoring invalid settings at {}: {err}", path.display());
                        CounterSettings::default()
                    }
                },
                Err(err) => {
                    warn!("Ignoring corrupt settings at {}: {err}", path.display());
                    CounterSettings::default()
                }
            }
        } else {
            CounterSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, CounterSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CounterSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn settings(&self) -> CounterSettings {
        self.read().clone()
    }

    pub fn session(&self) -> SessionConfig {
        self.read().session.clone()
    }

    pub fn scoring(&self) -> ScoringConfig {
        self.read().scoring.clone()
    }

    /// Validated before it is stored.
    pub fn update_session(&self, session: SessionConfig) -> Result<()> {
        session.validate()?;
        let mut guard = self.write();
        guard.session = session;
        self.persist(&guard)
    }

    /// Validated before it is stored.
    pub fn update_scoring(&self, scoring: ScoringConfig) -> Result<()> {
        scoring.validate()?;
        let mut guard = self.write();
        guard.scoring = scoring;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: CounterSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        data.validate()?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &CounterSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CountingMode;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.settings(), CounterSettings::default());
    }

    #[test]
    fn updates_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update_session(SessionConfig {
                mode: CountingMode::Strict,
                active_secs: 30,
                ..SessionConfig::default()
            })
            .unwrap();
        store
            .update_scoring(ScoringConfig {
                points_per_rep: 1.0,
                max_attempts_per_day: 3,
            })
            .unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.session().mode, CountingMode::Strict);
        assert_eq!(reopened.session().active_secs, 30);
        assert_eq!(reopened.scoring().max_attempts_per_day, 3);
    }

    #[test]
    fn invalid_session_config_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let result = store.update_session(SessionConfig {
            down_threshold_deg: 170.0,
            up_threshold_deg: 160.0,
            ..SessionConfig::default()
        });
        assert!(result.is_err());
        assert_eq!(store.session(), SessionConfig::default());
    }

    #[test]
    fn invalid_scoring_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        for points_per_rep in [-1.0, f64::NAN] {
            let result = store.update_scoring(ScoringConfig {
                points_per_rep,
                ..ScoringConfig::default()
            });
            assert!(result.is_err());
        }
        assert_eq!(store.scoring(), ScoringConfig::default());
        assert!(!path.exists());
    }

    #[test]
    fn hand_edited_invalid_scoring_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"scoring": {"pointsPerRep": -3.0}}"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.scoring(), ScoringConfig::default());
        assert!(store.reload().is_err());
    }

    #[test]
    fn corrupt_file_falls_back_and_reload_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.settings(), CounterSettings::default());
        assert!(store.reload().is_err());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"session": {"countdownSecs": 3}}"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.session().countdown_secs, 3);
        assert_eq!(store.session().active_secs, 60);
        assert_eq!(store.scoring(), ScoringConfig::default());
    }
}
