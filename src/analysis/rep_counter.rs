//! Push-up repetition state machine.
//!
//! Two phases with a hysteresis band between the thresholds:
//!
//! ```text
//!   AwaitingDown --(elbow < down)--> AwaitingUp
//!   AwaitingUp   --(elbow > up)----> AwaitingDown, count += 1
//! ```
//!
//! Angles inside `[down, up]` and invalid samples never move the machine.

use serde::{Deserialize, Serialize};

use super::angles::AngleSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepPhase {
    /// Arms extended; waiting for the descent.
    #[default]
    AwaitingDown,
    /// Arms flexed; waiting for the push back up.
    AwaitingUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CountingMode {
    #[default]
    Normal,
    /// Also requires hips and knees in view and a straight back.
    Strict,
}

/// User-facing cue. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feedback {
    #[default]
    GetReady,
    GoDown,
    Up,
    BodyNotVisible,
    ShowFullBody,
    StraightenBack,
}

impl Feedback {
    pub fn message(self) -> &'static str {
        match self {
            Feedback::GetReady => "Get Ready",
            Feedback::GoDown => "GO DOWN",
            Feedback::Up => "UP",
            Feedback::BodyNotVisible => "Body not fully visible",
            Feedback::ShowFullBody => "Show Full Body (Hips & Knees)",
            Feedback::StraightenBack => "Straighten Your Back!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepRules {
    pub down_threshold_deg: f32,
    pub up_threshold_deg: f32,
    pub mode: CountingMode,
    pub min_body_alignment_deg: f32,
}

impl Default for RepRules {
    fn default() -> Self {
        Self {
            down_threshold_deg: 90.0,
            up_threshold_deg: 160.0,
            mode: CountingMode::Normal,
            min_body_alignment_deg: 150.0,
        }
    }
}

/// Result of feeding one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepUpdate {
    pub phase: RepPhase,
    pub count: u32,
    pub completed_rep: bool,
    pub feedback: Feedback,
}

#[derive(Debug, Clone)]
pub struct RepCounter {
    rules: RepRules,
    phase: RepPhase,
    count: u32,
    feedback: Feedback,
}

impl RepCounter {
    pub fn new(rules: RepRules) -> Self {
        Self {
            rules,
            phase: RepPhase::AwaitingDown,
            count: 0,
            feedback: Feedback::GetReady,
        }
    }

    pub fn phase(&self) -> RepPhase {
        self.phase
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn feedback(&self) -> Feedback {
        self.feedback
    }

    /// Blocking cue for a sample that must not drive the machine, if any.
    fn gate(&self, sample: &AngleSample) -> Option<Feedback> {
        if !sample.is_valid() {
            return Some(Feedback::BodyNotVisible);
        }
        if self.rules.mode == CountingMode::Strict {
            match sample.body_deg {
                None => return Some(Feedback::ShowFullBody),
                Some(body) if !(body >= self.rules.min_body_alignment_deg) => {
                    return Some(Feedback::StraightenBack)
                }
                Some(_) => {}
            }
        }
        None
    }

    pub fn observe(&mut self, sample: &AngleSample) -> RepUpdate {
        if let Some(cue) = self.gate(sample) {
            self.feedback = cue;
            return self.update(false);
        }

        let angle = sample.elbow_deg;
        let mut completed = false;

        match self.phase {
            RepPhase::AwaitingDown if angle < self.rules.down_threshold_deg => {
                self.phase = RepPhase::AwaitingUp;
            }
            RepPhase::AwaitingUp if angle > self.rules.up_threshold_deg => {
                self.phase = RepPhase::AwaitingDown;
                self.count += 1;
                completed = true;
            }
            _ => {}
        }

        if angle < self.rules.down_threshold_deg {
            self.feedback = Feedback::Up;
        } else if angle >= self.rules.up_threshold_deg && self.phase == RepPhase::AwaitingDown {
            self.feedback = Feedback::GoDown;
        } else if matches!(
            self.feedback,
            Feedback::BodyNotVisible | Feedback::ShowFullBody | Feedback::StraightenBack
        ) {
            // Back in view mid-movement; drop the stale visibility cue.
            self.feedback = match self.phase {
                RepPhase::AwaitingDown => Feedback::GoDown,
                RepPhase::AwaitingUp => Feedback::Up,
            };
        }

        self.update(completed)
    }

    /// Cue for a sample seen before counting starts. Leaves the machine untouched.
    pub fn preview(&self, sample: &AngleSample) -> Feedback {
        self.gate(sample).unwrap_or(Feedback::GetReady)
    }

    /// Back to `AwaitingDown` after the camera geometry changed. The count is kept.
    pub fn reset_phase(&mut self) {
        self.phase = RepPhase::AwaitingDown;
        self.feedback = Feedback::GetReady;
    }

    fn update(&self, completed_rep: bool) -> RepUpdate {
        RepUpdate {
            phase: self.phase,
            count: self.count,
            completed_rep,
            feedback: self.feedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::BodySide;
    use rand::Rng;

    fn sample(deg: f32) -> AngleSample {
        AngleSample {
            elbow_deg: deg,
            side: Some(BodySide::Left),
            body_deg: None,
        }
    }

    fn run(counter: &mut RepCounter, samples: &[AngleSample]) -> Vec<RepUpdate> {
        samples.iter().map(|s| counter.observe(s)).collect()
    }

    #[test]
    fn dead_zone_never_moves_the_machine() {
        let mut counter = RepCounter::new(RepRules::default());
        run(&mut counter, &[sample(120.0), sample(130.0), sample(110.0)]);

        assert_eq!(counter.count(), 0);
        assert_eq!(counter.phase(), RepPhase::AwaitingDown);
    }

    #[test]
    fn full_cycle_counts_once() {
        let mut counter = RepCounter::new(RepRules::default());
        let updates = run(&mut counter, &[sample(170.0), sample(80.0), sample(170.0)]);

        assert_eq!(updates[0].phase, RepPhase::AwaitingDown);
        assert_eq!(updates[0].count, 0);
        assert_eq!(updates[1].phase, RepPhase::AwaitingUp);
        assert_eq!(updates[1].count, 0);
        assert_eq!(updates[2].phase, RepPhase::AwaitingDown);
        assert!(updates[2].completed_rep);
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn two_cycles_count_on_third_and_fifth_sample() {
        let mut counter = RepCounter::new(RepRules::default());
        let angles = [170.0, 80.0, 170.0, 80.0, 170.0];
        let updates = run(&mut counter, &angles.map(sample));

        let counts: Vec<u32> = updates.iter().map(|u| u.count).collect();
        assert_eq!(counts, vec![0, 0, 1, 1, 2]);
        let completed: Vec<usize> = updates
            .iter()
            .enumerate()
            .filter(|(_, u)| u.completed_rep)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(completed, vec![2, 4]);
    }

    #[test]
    fn invalid_samples_are_no_ops() {
        let mut noisy = RepCounter::new(RepRules::default());
        let noisy_updates = run(
            &mut noisy,
            &[
                sample(170.0),
                AngleSample::invalid(),
                AngleSample::invalid(),
                sample(80.0),
                sample(170.0),
            ],
        );
        assert_eq!(noisy_updates[1].feedback, Feedback::BodyNotVisible);
        assert_eq!(noisy_updates[1].phase, RepPhase::AwaitingDown);

        let mut clean = RepCounter::new(RepRules::default());
        run(&mut clean, &[sample(170.0), sample(80.0), sample(170.0)]);

        assert_eq!(noisy.count(), clean.count());
        assert_eq!(noisy.phase(), clean.phase());
    }

    #[test]
    fn exact_thresholds_sit_in_the_dead_zone() {
        let mut counter = RepCounter::new(RepRules::default());
        run(&mut counter, &[sample(90.0)]);
        assert_eq!(counter.phase(), RepPhase::AwaitingDown);

        run(&mut counter, &[sample(89.9), sample(160.0)]);
        assert_eq!(counter.phase(), RepPhase::AwaitingUp);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn non_finite_angles_are_ignored() {
        let mut counter = RepCounter::new(RepRules::default());
        run(&mut counter, &[sample(80.0), sample(f32::NAN), sample(f32::INFINITY)]);
        assert_eq!(counter.phase(), RepPhase::AwaitingUp);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn feedback_follows_thresholds() {
        let mut counter = RepCounter::new(RepRules::default());
        assert_eq!(counter.feedback(), Feedback::GetReady);

        assert_eq!(counter.observe(&sample(165.0)).feedback, Feedback::GoDown);
        assert_eq!(counter.observe(&sample(120.0)).feedback, Feedback::GoDown);
        assert_eq!(counter.observe(&sample(60.0)).feedback, Feedback::Up);
        assert_eq!(counter.observe(&sample(120.0)).feedback, Feedback::Up);
        assert_eq!(counter.observe(&sample(175.0)).feedback, Feedback::GoDown);
        assert_eq!(Feedback::BodyNotVisible.message(), "Body not fully visible");
    }

    #[test]
    fn strict_mode_requires_straight_visible_body() {
        let rules = RepRules {
            mode: CountingMode::Strict,
            ..RepRules::default()
        };
        let mut counter = RepCounter::new(rules);
        let with_body = |elbow: f32, body: f32| AngleSample {
            body_deg: Some(body),
            ..sample(elbow)
        };

        assert_eq!(counter.observe(&sample(80.0)).feedback, Feedback::ShowFullBody);
        assert_eq!(
            counter.observe(&with_body(80.0, 120.0)).feedback,
            Feedback::StraightenBack
        );
        assert_eq!(counter.phase(), RepPhase::AwaitingDown);

        counter.observe(&with_body(80.0, 170.0));
        let update = counter.observe(&with_body(170.0, 160.0));
        assert!(update.completed_rep);
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn normal_mode_ignores_body_alignment() {
        let mut counter = RepCounter::new(RepRules::default());
        let sagging = |elbow: f32| AngleSample {
            body_deg: Some(100.0),
            ..sample(elbow)
        };
        run(&mut counter, &[sagging(80.0), sagging(170.0)]);
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn preview_reports_visibility_without_moving() {
        let counter = RepCounter::new(RepRules::default());
        assert_eq!(counter.preview(&AngleSample::invalid()), Feedback::BodyNotVisible);
        assert_eq!(counter.preview(&sample(60.0)), Feedback::GetReady);
        assert_eq!(counter.phase(), RepPhase::AwaitingDown);
    }

    #[test]
    fn reset_phase_keeps_count() {
        let mut counter = RepCounter::new(RepRules::default());
        run(&mut counter, &[sample(80.0), sample(170.0), sample(80.0)]);
        assert_eq!(counter.phase(), RepPhase::AwaitingUp);

        counter.reset_phase();

        assert_eq!(counter.phase(), RepPhase::AwaitingDown);
        assert_eq!(counter.count(), 1);
        counter.observe(&sample(170.0));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn random_sequences_count_at_most_one_per_sample() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let mut counter = RepCounter::new(RepRules::default());
            let mut previous = 0;
            let mut transitions_up = 0;
            let mut last_phase = counter.phase();

            for _ in 0..100 {
                let s = if rng.gen_bool(0.1) {
                    AngleSample::invalid()
                } else {
                    sample(rng.gen_range(0.0..180.0))
                };
                let update = counter.observe(&s);

                assert!(update.count >= previous);
                assert!(update.count - previous <= 1);
                if last_phase == RepPhase::AwaitingUp && update.phase == RepPhase::AwaitingDown {
                    transitions_up += 1;
                }
                assert_eq!(update.count, transitions_up);
                previous = update.count;
                last_phase = update.phase;
            }
        }
    }
}
