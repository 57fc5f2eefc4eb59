//! Mixture-of-experts mode gate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::GoalDomain;
use crate::graph::ChannelKind;
use crate::math::{clamp01, softmax};

/// Latent behavioural modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Threat,
    Social,
    Explore,
    Resource,
    Care,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Threat, Mode::Social, Mode::Explore, Mode::Resource, Mode::Care];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Threat => "threat",
            Mode::Social => "social",
            Mode::Explore => "explore",
            Mode::Resource => "resource",
            Mode::Care => "care",
        }
    }

    /// Score of this mode from felt channel intensities.
    pub fn score(&self, felt: &BTreeMap<ChannelKind, f64>) -> f64 {
        let f = |c: ChannelKind| felt.get(&c).copied().unwrap_or(0.0);
        let value = match self {
            Mode::Threat => f(ChannelKind::Threat),
            Mode::Social => 0.6 * f(ChannelKind::Norm) + 0.4 * f(ChannelKind::Attachment),
            Mode::Explore => 0.7 * f(ChannelKind::Curiosity) + 0.3 * f(ChannelKind::Uncertainty),
            Mode::Resource => f(ChannelKind::Resource),
            Mode::Care => f(ChannelKind::Attachment),
        };
        clamp01(value)
    }

    /// How strongly this mode favours a domain.
    pub fn affinity(&self, domain: GoalDomain) -> f64 {
        use GoalDomain::*;
        match (self, domain) {
            (Mode::Threat, Safety) => 1.0,
            (Mode::Threat, Control) => 0.4,
            (Mode::Threat, Order) => 0.2,
            (Mode::Social, Affiliation) => 0.6,
            (Mode::Social, Status) => 0.7,
            (Mode::Social, Order) => 0.3,
            (Mode::Explore, Exploration) => 1.0,
            (Mode::Explore, Control) => 0.3,
            (Mode::Resource, Wealth) => 1.0,
            (Mode::Resource, Rest) => 0.2,
            (Mode::Care, Affiliation) => 0.8,
            (Mode::Care, Rest) => 0.3,
            _ => 0.0,
        }
    }
}

/// Mode scores, gate weights and the resulting domain biases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeGate {
    pub scores: BTreeMap<Mode, f64>,
    pub weights: BTreeMap<Mode, f64>,
    pub temperature: f64,
}

impl ModeGate {
    pub fn compute(felt: &BTreeMap<ChannelKind, f64>, temperature: f64) -> Self {
        let scores: Vec<f64> = Mode::ALL.iter().map(|m| m.score(felt)).collect();
        let weights = softmax(&scores, temperature);
        Self {
            scores: Mode::ALL.iter().copied().zip(scores).collect(),
            weights: Mode::ALL.iter().copied().zip(weights).collect(),
            temperature,
        }
    }

    /// Weighted mode affinity for a domain, in [0, 1].
    pub fn bias(&self, domain: GoalDomain) -> f64 {
        self.weights
            .iter()
            .map(|(mode, w)| w * mode.affinity(domain))
            .sum()
    }

    /// The dominant mode; ties go to the earlier mode in [`Mode::ALL`].
    pub fn dominant(&self) -> Mode {
        let mut best = (Mode::Threat, f64::NEG_INFINITY);
        for mode in Mode::ALL {
            let w = self.weights.get(&mode).copied().unwrap_or(0.0);
            if w > best.1 {
                best = (mode, w);
            }
        }
        best.0
    }

    /// Apply the gate bias to base domain scores.
    pub fn apply(&self, base: &BTreeMap<GoalDomain, f64>, gain: f64) -> BTreeMap<GoalDomain, f64> {
        base.iter()
            .map(|(domain, score)| (*domain, clamp01(score + gain * self.bias(*domain))))
            .collect()
    }
}
