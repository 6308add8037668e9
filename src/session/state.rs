use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AngleSample, Feedback, RepCounter, RepUpdate},
    pose::CameraFacing,
};

use super::{
    config::SessionConfig,
    events::{FinishReason, SessionOutcome, SessionPhase, SessionSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: SessionPhase,
    pub countdown_remaining_secs: u32,
    pub active_remaining_secs: u32,
}

/// What one wall-clock second did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ClockTick {
    Countdown { remaining_secs: u32 },
    Started { active_secs: u32 },
    Active { remaining_secs: u32 },
    Expired(SessionOutcome),
    /// Already finished; the ticker should stop.
    Finished,
}

/// Deterministic core of a session: countdown, active window and rep
/// counting, advanced only through [`tick_clock`](Self::tick_clock) (once per
/// second) and [`on_sample`](Self::on_sample) (once per processed frame).
#[derive(Debug, Clone)]
pub struct SessionMachine {
    session_id: String,
    config: SessionConfig,
    state: SessionState,
    reps: RepCounter,
    countdown_feedback: Feedback,
    facing: CameraFacing,
    outcome: Option<SessionOutcome>,
}

impl SessionMachine {
    pub fn new(session_id: String, config: SessionConfig) -> Self {
        let state = if config.countdown_secs == 0 {
            SessionState {
                phase: SessionPhase::Active,
                countdown_remaining_secs: 0,
                active_remaining_secs: config.active_secs,
            }
        } else {
            SessionState {
                phase: SessionPhase::Countdown,
                countdown_remaining_secs: config.countdown_secs,
                active_remaining_secs: config.active_secs,
            }
        };

        Self {
            session_id,
            reps: RepCounter::new(config.rep_rules()),
            facing: config.facing,
            config,
            state,
            countdown_feedback: Feedback::GetReady,
            outcome: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn rep_count(&self) -> u32 {
        self.reps.count()
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn tick_clock(&mut self) -> ClockTick {
        match self.state.phase {
            SessionPhase::Countdown => {
                self.state.countdown_remaining_secs =
                    self.state.countdown_remaining_secs.saturating_sub(1);
                if self.state.countdown_remaining_secs == 0 {
                    self.state.phase = SessionPhase::Active;
                    self.state.active_remaining_secs = self.config.active_secs;
                    ClockTick::Started {
                        active_secs: self.config.active_secs,
                    }
                } else {
                    ClockTick::Countdown {
                        remaining_secs: self.state.countdown_remaining_secs,
                    }
                }
            }
            SessionPhase::Active => {
                self.state.active_remaining_secs =
                    self.state.active_remaining_secs.saturating_sub(1);
                if self.state.active_remaining_secs == 0 {
                    match self.finish(FinishReason::TimeUp) {
                        Some(outcome) => ClockTick::Expired(outcome),
                        None => ClockTick::Finished,
                    }
                } else {
                    ClockTick::Active {
                        remaining_secs: self.state.active_remaining_secs,
                    }
                }
            }
            SessionPhase::Finished => ClockTick::Finished,
        }
    }

    /// Feed one frame's angles. Only the active window moves the rep counter;
    /// during the countdown the sample just refreshes the visibility cue.
    pub fn on_sample(&mut self, sample: &AngleSample) -> Option<RepUpdate> {
        match self.state.phase {
            SessionPhase::Countdown => {
                self.countdown_feedback = self.reps.preview(sample);
                None
            }
            SessionPhase::Active => Some(self.reps.observe(sample)),
            SessionPhase::Finished => None,
        }
    }

    /// Manual early finish. Only honoured during the active window.
    pub fn stop(&mut self) -> Option<SessionOutcome> {
        if self.state.phase != SessionPhase::Active {
            return None;
        }
        self.finish(FinishReason::Stopped)
    }

    /// Move to `Finished`. Returns the outcome to the first caller only.
    pub fn finish(&mut self, reason: FinishReason) -> Option<SessionOutcome> {
        if self.outcome.is_some() {
            return None;
        }

        let active_elapsed_secs = match self.state.phase {
            SessionPhase::Countdown => 0,
            SessionPhase::Active | SessionPhase::Finished => self
                .config
                .active_secs
                .saturating_sub(self.state.active_remaining_secs),
        };

        let reached_active = self.state.phase != SessionPhase::Countdown;
        self.state.phase = SessionPhase::Finished;
        let outcome = SessionOutcome {
            session_id: self.session_id.clone(),
            rep_count: self.reps.count(),
            reason,
            active_elapsed_secs,
            reached_active,
            finished_at: Utc::now(),
        };
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    /// The mirrored/unmirrored geometry changed; a half-done rep is discarded.
    pub fn switch_facing(&mut self, facing: CameraFacing) {
        if self.state.phase == SessionPhase::Finished {
            return;
        }
        self.facing = facing;
        self.reps.reset_phase();
        self.countdown_feedback = Feedback::GetReady;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let feedback = match self.state.phase {
            SessionPhase::Countdown => self.countdown_feedback,
            SessionPhase::Active | SessionPhase::Finished => self.reps.feedback(),
        };

        SessionSnapshot {
            session_id: self.session_id.clone(),
            phase: self.state.phase,
            countdown_remaining_secs: self.state.countdown_remaining_secs,
            active_remaining_secs: self.state.active_remaining_secs,
            rep_count: self.reps.count(),
            rep_phase: self.reps.phase(),
            feedback,
            facing: self.facing,
        }
    }
}
