//! Expected-utility action policy toward another agent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{BeliefPosterior, LatentTrait, TomConfig};
use crate::math::{clamp01, softmax};

/// Candidate social actions toward another agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TomAction {
    Assist,
    ShareInfo,
    Negotiate,
    Monitor,
    Avoid,
    SetBoundary,
    Confront,
    Defer,
}

impl TomAction {
    pub const ALL: [TomAction; 8] = [
        TomAction::Assist,
        TomAction::ShareInfo,
        TomAction::Negotiate,
        TomAction::Monitor,
        TomAction::Avoid,
        TomAction::SetBoundary,
        TomAction::Confront,
        TomAction::Defer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TomAction::Assist => "assist",
            TomAction::ShareInfo => "share_info",
            TomAction::Negotiate => "negotiate",
            TomAction::Monitor => "monitor",
            TomAction::Avoid => "avoid",
            TomAction::SetBoundary => "set_boundary",
            TomAction::Confront => "confront",
            TomAction::Defer => "defer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == raw)
    }
}

/// Probabilities the policy reasons over, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyInputs {
    pub helpful: f64,
    pub harmful: f64,
    pub truthful: f64,
    /// Situational danger around self.
    pub danger: f64,
}

impl PolicyInputs {
    pub fn from_beliefs(beliefs: &BTreeMap<LatentTrait, BeliefPosterior>, danger: f64) -> Self {
        let p = |t: LatentTrait| beliefs.get(&t).map(|b| b.posterior).unwrap_or(0.5);
        Self {
            helpful: p(LatentTrait::Helpfulness),
            harmful: p(LatentTrait::Harmfulness),
            truthful: p(LatentTrait::Truthfulness),
            danger: clamp01(danger),
        }
    }
}

/// One outcome of an action: its probability and utility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTerm {
    pub outcome: String,
    pub probability: f64,
    pub utility: f64,
}

impl OutcomeTerm {
    fn new(outcome: &'static str, probability: f64, utility: f64) -> Self {
        Self {
            outcome: outcome.to_string(),
            probability: clamp01(probability),
            utility,
        }
    }

    pub fn value(&self) -> f64 {
        self.probability * self.utility
    }
}

/// Outcome table of an action.
pub fn outcome_terms(action: TomAction, p: &PolicyInputs) -> Vec<OutcomeTerm> {
    let (h, m, t, d) = (p.helpful, p.harmful, p.truthful, p.danger);
    match action {
        TomAction::Assist => vec![
            OutcomeTerm::new("reciprocated", h, 0.9),
            OutcomeTerm::new("exploited", m, -0.8),
            OutcomeTerm::new("wasted_effort", 1.0 - h, -0.2),
        ],
        TomAction::ShareInfo => vec![
            OutcomeTerm::new("coordinated", t, 0.7),
            OutcomeTerm::new("info_misused", m, -0.6),
            OutcomeTerm::new("misled_in_return", 1.0 - t, -0.3),
        ],
        TomAction::Negotiate => vec![
            OutcomeTerm::new("deal_reached", (1.0 - m) * t, 0.6),
            OutcomeTerm::new("stalled", 1.0 - t, -0.1),
            OutcomeTerm::new("escalation", m * d, -0.5),
        ],
        TomAction::Monitor => vec![
            OutcomeTerm::new("early_warning", m, 0.4),
            OutcomeTerm::new("caught_deception", 1.0 - t, 0.2),
            OutcomeTerm::new("attention_cost", 1.0, -0.1),
        ],
        TomAction::Avoid => vec![
            OutcomeTerm::new("harm_escaped", m, 0.6),
            OutcomeTerm::new("danger_escaped", d, 0.3),
            OutcomeTerm::new("help_forgone", h, -0.5),
        ],
        TomAction::SetBoundary => vec![
            OutcomeTerm::new("harm_limited", m, 0.5),
            OutcomeTerm::new("deception_limited", 1.0 - t, 0.25),
            OutcomeTerm::new("relationship_strain", h, -0.25),
        ],
        TomAction::Confront => vec![
            OutcomeTerm::new("harm_stopped", m * (1.0 - d), 0.7),
            OutcomeTerm::new("retaliation", m * d, -0.9),
            OutcomeTerm::new("ally_alienated", h, -0.7),
        ],
        TomAction::Defer => vec![OutcomeTerm::new("status_quo", 1.0, 0.05)],
    }
}

/// Expected utilities and the resulting action distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPolicy {
    pub inputs: PolicyInputs,
    pub temperature: f64,
    pub expected_utility: BTreeMap<TomAction, f64>,
    pub probabilities: BTreeMap<TomAction, f64>,
    pub terms: BTreeMap<TomAction, Vec<OutcomeTerm>>,
}

impl ActionPolicy {
    /// The most probable action; ties go to the earlier action in [`TomAction::ALL`].
    pub fn best(&self) -> (TomAction, f64) {
        let mut best = (TomAction::Defer, f64::NEG_INFINITY);
        for action in TomAction::ALL {
            let p = self.probabilities.get(&action).copied().unwrap_or(0.0);
            if p > best.1 {
                best = (action, p);
            }
        }
        best
    }
}

pub fn compute_policy(inputs: PolicyInputs, s2: f64, config: &TomConfig) -> ActionPolicy {
    let temperature = config.temperature(s2);

    let mut terms = BTreeMap::new();
    let mut utilities = Vec::with_capacity(TomAction::ALL.len());
    let mut expected_utility = BTreeMap::new();
    for action in TomAction::ALL {
        let action_terms = outcome_terms(action, &inputs);
        let eu: f64 = action_terms.iter().map(OutcomeTerm::value).sum();
        utilities.push(eu);
        expected_utility.insert(action, eu);
        terms.insert(action, action_terms);
    }

    let probabilities = TomAction::ALL
        .iter()
        .copied()
        .zip(softmax(&utilities, temperature))
        .collect();

    ActionPolicy {
        inputs,
        temperature,
        expected_utility,
        probabilities,
        terms,
    }
}
