use serde::{Deserialize, Serialize};

use crate::{
    analysis::{CountingMode, RepRules},
    pose::CameraFacing,
};

use super::error::SessionError;

/// Tunables for one timed attempt. The angle and confidence defaults are
/// empirical, not calibrated; hosts may override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub countdown_secs: u32,
    pub active_secs: u32,
    pub min_keypoint_confidence: f32,
    pub down_threshold_deg: f32,
    pub up_threshold_deg: f32,
    pub mode: CountingMode,
    pub min_body_alignment_deg: f32,
    pub facing: CameraFacing,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            active_secs: 60,
            min_keypoint_confidence: 0.3,
            down_threshold_deg: 90.0,
            up_threshold_deg: 160.0,
            mode: CountingMode::Normal,
            min_body_alignment_deg: 150.0,
            facing: CameraFacing::Front,
        }
    }
}

impl SessionConfig {
    pub fn rep_rules(&self) -> RepRules {
        RepRules {
            down_threshold_deg: self.down_threshold_deg,
            up_threshold_deg: self.up_threshold_deg,
            mode: self.mode,
            min_body_alignment_deg: self.min_body_alignment_deg,
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.active_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "active_secs must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_keypoint_confidence) {
            return Err(SessionError::InvalidConfig(format!(
                "min_keypoint_confidence {} is outside [0, 1]",
                self.min_keypoint_confidence
            )));
        }

        for (name, value) in [
            ("down_threshold_deg", self.down_threshold_deg),
            ("up_threshold_deg", self.up_threshold_deg),
            ("min_body_alignment_deg", self.min_body_alignment_deg),
        ] {
            if !(value > 0.0 && value <= 180.0) {
                return Err(SessionError::InvalidConfig(format!(
                    "{name} {value} is outside (0, 180]"
                )));
            }
        }

        if self.down_threshold_deg >= self.up_threshold_deg {
            return Err(SessionError::InvalidConfig(format!(
                "down threshold {} must be below up threshold {}",
                self.down_threshold_deg, self.up_threshold_deg
            )));
        }

        Ok(())
    }
}
