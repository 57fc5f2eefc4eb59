//! Goal ecology.
//!
//! Per-domain goal pressure flows through three steps:
//! 1. **Mode gate**: five latent modes scored from felt channels, softmaxed
//!    into weights that bias each domain
//! 2. **Hysteretic selection**: previously active goals keep an advantage
//!    scaled by their lock-in, so near ties do not flicker
//! 3. **State integration**: tension, lock-in, fatigue and progress evolve
//!    as leaky integrators, carried per (agent, domain) across ticks

mod gate;
mod hysteresis;
mod state;

pub use gate::*;
pub use hysteresis::*;
pub use state::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{MindError, MindResult};
use crate::math::{clamp01, noisy_or};

/// Goal domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalDomain {
    Safety,
    Control,
    Affiliation,
    Status,
    Exploration,
    Order,
    Rest,
    Wealth,
}

impl GoalDomain {
    pub const ALL: [GoalDomain; 8] = [
        GoalDomain::Safety,
        GoalDomain::Control,
        GoalDomain::Affiliation,
        GoalDomain::Status,
        GoalDomain::Exploration,
        GoalDomain::Order,
        GoalDomain::Rest,
        GoalDomain::Wealth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalDomain::Safety => "safety",
            GoalDomain::Control => "control",
            GoalDomain::Affiliation => "affiliation",
            GoalDomain::Status => "status",
            GoalDomain::Exploration => "exploration",
            GoalDomain::Order => "order",
            GoalDomain::Rest => "rest",
            GoalDomain::Wealth => "wealth",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.as_str() == raw)
    }
}

impl std::fmt::Display for GoalDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for the goal ecology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalConfig {
    /// Maximum simultaneously active domains.
    pub max_active: usize,

    /// Minimum score for a domain to become active.
    pub min_score: f64,

    /// Hysteresis margin; a previously active domain is dropped only when it
    /// loses by more than `margin x (1 + lock_in)`.
    pub margin: f64,

    /// Softmax temperature of the mode gate.
    pub mode_temperature: f64,

    /// Strength of the mode bias on domain scores.
    pub mode_bias_gain: f64,

    pub tension_rate: f64,
    pub tension_decay: f64,
    pub lock_rate: f64,
    pub lock_decay: f64,
    /// Saturation bound of lock-in.
    pub lock_max: f64,
    pub fatigue_rate: f64,
    pub fatigue_recovery: f64,
    pub progress_rate: f64,

    /// Share of tension and fatigue kept when a goal completes.
    pub completion_tension_keep: f64,
    pub completion_fatigue_keep: f64,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            max_active: 2,
            min_score: 0.15,
            margin: 0.08,
            mode_temperature: 0.35,
            mode_bias_gain: 0.25,
            tension_rate: 0.3,
            tension_decay: 0.15,
            lock_rate: 0.2,
            lock_decay: 0.1,
            lock_max: 0.95,
            fatigue_rate: 0.06,
            fatigue_recovery: 0.1,
            progress_rate: 0.08,
            completion_tension_keep: 0.4,
            completion_fatigue_keep: 0.5,
        }
    }
}

impl GoalConfig {
    pub fn validate(&self) -> MindResult<()> {
        if self.max_active == 0 {
            return Err(MindError::Config("goals.max_active must be at least 1".to_string()));
        }
        if self.margin < 0.0 {
            return Err(MindError::Config("goals.margin must be non-negative".to_string()));
        }
        if self.mode_temperature <= 0.0 {
            return Err(MindError::Config("goals.mode_temperature must be positive".to_string()));
        }
        let rates = [
            ("tension_rate", self.tension_rate),
            ("tension_decay", self.tension_decay),
            ("lock_rate", self.lock_rate),
            ("lock_decay", self.lock_decay),
            ("lock_max", self.lock_max),
            ("fatigue_rate", self.fatigue_rate),
            ("fatigue_recovery", self.fatigue_recovery),
            ("progress_rate", self.progress_rate),
            ("completion_tension_keep", self.completion_tension_keep),
            ("completion_fatigue_keep", self.completion_fatigue_keep),
        ];
        for (name, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(MindError::Config(format!("goals.{} {} outside [0, 1]", name, value)));
            }
        }
        Ok(())
    }
}

/// Driver and context inputs of domain pressure, each in [0, 1].
///
/// Absent inputs default to the neutral values of [`DomainDrivers::default`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainDrivers {
    pub threat: f64,
    pub fear: f64,
    pub health: f64,
    pub uncertainty: f64,
    pub control: f64,
    pub support: f64,
    pub sadness: f64,
    pub norm_pressure: f64,
    pub publicness: f64,
    pub shame: f64,
    pub curiosity: f64,
    pub conscientiousness: f64,
    pub fatigue: f64,
    pub stress: f64,
    pub scarcity: f64,
    pub resources: f64,
}

impl Default for DomainDrivers {
    fn default() -> Self {
        Self {
            threat: 0.0,
            fear: 0.0,
            health: 1.0,
            uncertainty: 0.5,
            control: 0.5,
            support: 0.5,
            sadness: 0.0,
            norm_pressure: 0.0,
            publicness: 0.5,
            shame: 0.0,
            curiosity: 0.5,
            conscientiousness: 0.5,
            fatigue: 0.0,
            stress: 0.0,
            scarcity: 0.0,
            resources: 0.5,
        }
    }
}

/// Base pressure of a domain before mode gating.
pub fn domain_pressure(domain: GoalDomain, d: &DomainDrivers) -> f64 {
    let value = match domain {
        GoalDomain::Safety => noisy_or([d.threat, 0.6 * d.fear, 0.5 * (1.0 - d.health)]),
        GoalDomain::Control => 0.6 * d.uncertainty + 0.4 * (1.0 - d.control),
        GoalDomain::Affiliation => 0.5 * (1.0 - d.support) + 0.3 * d.sadness + 0.2 * (1.0 - d.threat),
        GoalDomain::Status => 0.4 * d.norm_pressure + 0.3 * d.publicness + 0.3 * d.shame,
        GoalDomain::Exploration => d.curiosity * (1.0 - d.threat) * (0.5 + 0.5 * d.uncertainty),
        GoalDomain::Order => 0.4 * d.norm_pressure + 0.3 * d.uncertainty + 0.3 * d.conscientiousness,
        GoalDomain::Rest => 0.7 * d.fatigue + 0.3 * d.stress,
        GoalDomain::Wealth => 0.6 * d.scarcity + 0.4 * (1.0 - d.resources),
    };
    clamp01(value)
}

/// Base pressure for every domain.
pub fn domain_pressures(drivers: &DomainDrivers) -> BTreeMap<GoalDomain, f64> {
    GoalDomain::ALL
        .iter()
        .map(|d| (*d, domain_pressure(*d, drivers)))
        .collect()
}
