//! Per-(agent, domain) goal control state.

use serde::{Deserialize, Serialize};

use super::GoalConfig;
use crate::math::{clamp01, leak};

/// Leaky-integrator state of one goal domain for one agent.
///
/// Created on first evaluation, updated every tick the domain is evaluated,
/// and decays toward neutral while inactive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GoalState {
    pub tension: f64,
    pub lock_in: f64,
    pub fatigue: f64,
    pub progress: f64,
    pub last_active_tick: Option<u64>,
}

/// Result of one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalStep {
    pub before: GoalState,
    pub after: GoalState,
    pub active: bool,
    pub score: f64,
    pub win_margin: f64,
    /// Progress reached 1 this step.
    pub completed: bool,
}

impl GoalState {
    /// Advance the state by one tick. The receiver is not modified.
    pub fn step(
        &self,
        active: bool,
        score: f64,
        win_margin: f64,
        tick: u64,
        config: &GoalConfig,
    ) -> GoalStep {
        let score = clamp01(score);
        let mut next = *self;

        if active {
            next.tension = leak(self.tension, score, config.tension_rate);

            let lead = if config.margin > 0.0 {
                clamp01(win_margin / config.margin)
            } else {
                1.0
            };
            let headroom = (config.lock_max - self.lock_in).max(0.0);
            next.lock_in = self.lock_in + config.lock_rate * headroom * (0.5 + 0.5 * lead);

            next.fatigue =
                self.fatigue + config.fatigue_rate * (1.0 - self.fatigue) * (0.5 + 0.5 * next.tension);
            next.progress =
                self.progress + config.progress_rate * (1.0 - next.fatigue) * (0.5 + 0.5 * score);
            next.last_active_tick = Some(tick);
        } else {
            next.tension = leak(self.tension, 0.0, config.tension_decay);
            next.lock_in = self.lock_in * (1.0 - config.lock_decay);
            next.fatigue = self.fatigue * (1.0 - config.fatigue_recovery);
        }

        let completed = next.progress >= 1.0;
        if completed {
            next.progress = 0.0;
            next.tension *= config.completion_tension_keep;
            next.fatigue *= config.completion_fatigue_keep;
        }

        GoalStep {
            before: *self,
            after: next,
            active,
            score,
            win_margin,
            completed,
        }
    }
}
