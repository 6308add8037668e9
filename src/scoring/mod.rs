//! Points and the daily attempt cap.

use serde::{Deserialize, Serialize};

use crate::session::SessionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    pub points_per_rep: f64,
    pub max_attempts_per_day: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            points_per_rep: 2.5,
            max_attempts_per_day: 2,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(self.points_per_rep.is_finite() && self.points_per_rep >= 0.0) {
            return Err(SessionError::InvalidConfig(format!(
                "points_per_rep {} must be a finite, non-negative number",
                self.points_per_rep
            )));
        }
        if self.max_attempts_per_day == 0 {
            return Err(SessionError::InvalidConfig(
                "max_attempts_per_day must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

pub fn derive_points(rep_count: u32, points_per_rep: f64) -> f64 {
    f64::from(rep_count) * points_per_rep
}

/// Whether one more attempt fits under `limit` for the day.
pub fn check_eligibility(attempts_today: u32, limit: u32) -> bool {
    attempts_today < limit
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub allowed: bool,
    pub attempts_used: u32,
    pub attempts_remaining: u32,
    pub limit: u32,
}

pub fn evaluate_eligibility(attempts_today: u32, config: &ScoringConfig) -> Eligibility {
    let limit = config.max_attempts_per_day;
    Eligibility {
        allowed: check_eligibility(attempts_today, limit),
        attempts_used: attempts_today,
        attempts_remaining: limit.saturating_sub(attempts_today),
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scoring_is_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
        let free = ScoringConfig {
            points_per_rep: 0.0,
            max_attempts_per_day: 1,
        };
        assert!(free.validate().is_ok());
    }

    #[test]
    fn rejects_unusable_points_and_caps() {
        for points_per_rep in [-2.5, f64::NAN, f64::INFINITY] {
            let config = ScoringConfig {
                points_per_rep,
                ..ScoringConfig::default()
            };
            assert!(matches!(config.validate(), Err(SessionError::InvalidConfig(_))));
        }

        let no_attempts = ScoringConfig {
            max_attempts_per_day: 0,
            ..ScoringConfig::default()
        };
        assert!(no_attempts.validate().is_err());
    }

    #[test]
    fn two_attempts_a_day() {
        let config = ScoringConfig::default();
        assert!(check_eligibility(0, config.max_attempts_per_day));
        assert!(check_eligibility(1, config.max_attempts_per_day));
        assert!(!check_eligibility(2, config.max_attempts_per_day));
        assert!(!check_eligibility(7, config.max_attempts_per_day));
    }

    #[test]
    fn eligibility_reports_what_is_left() {
        let config = ScoringConfig::default();
        assert_eq!(
            evaluate_eligibility(1, &config),
            Eligibility {
                allowed: true,
                attempts_used: 1,
                attempts_remaining: 1,
                limit: 2,
            }
        );

        let over = evaluate_eligibility(3, &config);
        assert!(!over.allowed);
        assert_eq!(over.attempts_remaining, 0);
    }

    #[test]
    fn points_are_linear_in_reps() {
        assert_eq!(derive_points(0, 2.5), 0.0);
        assert_eq!(derive_points(10, 2.5), 25.0);
        for rate in [0.5, 1.0, 2.5, 4.0] {
            assert_eq!(derive_points(10, rate), 10.0 * rate);
            assert_eq!(derive_points(7, rate) + derive_points(3, rate), derive_points(10, rate));
        }
    }

    #[test]
    fn config_reads_partial_json() {
        let config: ScoringConfig = serde_json::from_str(r#"{"pointsPerRep": 3.0}"#).unwrap();
        assert_eq!(config.points_per_rep, 3.0);
        assert_eq!(config.max_attempts_per_day, 2);
    }
}
