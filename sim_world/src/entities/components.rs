//! Component definitions for agents.

use serde::{Deserialize, Serialize};

use super::AgentId;

/// Stable personality traits, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Traits {
    /// Tendency to read ambiguous cues as hostile.
    pub paranoia: f64,
    pub empathy: f64,
    /// Familiarity with dangerous situations; dampens perceived danger.
    pub experience: f64,
    pub curiosity: f64,
    pub conscientiousness: f64,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            paranoia: 0.5,
            empathy: 0.5,
            experience: 0.5,
            curiosity: 0.5,
            conscientiousness: 0.5,
        }
    }
}

/// Trait names as used in atom ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraitKind {
    Paranoia,
    Empathy,
    Experience,
    Curiosity,
    Conscientiousness,
}

impl TraitKind {
    pub const ALL: [TraitKind; 5] = [
        TraitKind::Paranoia,
        TraitKind::Empathy,
        TraitKind::Experience,
        TraitKind::Curiosity,
        TraitKind::Conscientiousness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TraitKind::Paranoia => "paranoia",
            TraitKind::Empathy => "empathy",
            TraitKind::Experience => "experience",
            TraitKind::Curiosity => "curiosity",
            TraitKind::Conscientiousness => "conscientiousness",
        }
    }
}

impl Traits {
    pub fn get(&self, kind: TraitKind) -> f64 {
        match kind {
            TraitKind::Paranoia => self.paranoia,
            TraitKind::Empathy => self.empathy,
            TraitKind::Experience => self.experience,
            TraitKind::Curiosity => self.curiosity,
            TraitKind::Conscientiousness => self.conscientiousness,
        }
    }
}

/// Physical and material condition of an agent, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyState {
    pub health: f64,
    pub fatigue: f64,
    pub stress: f64,
    /// Normalized wealth/supplies; low values drive scarcity.
    pub resources: f64,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            health: 1.0,
            fatigue: 0.0,
            stress: 0.0,
            resources: 0.5,
        }
    }
}

/// A stored belief an agent holds about another agent's latent trait.
///
/// These become `belief:` atoms and seed the ToM priors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefRecord {
    pub about: AgentId,
    /// Latent trait name, e.g. `helpfulness`.
    pub trait_name: String,
    /// Believed probability in [0, 1].
    pub value: f64,
    pub confidence: f64,
}

impl BeliefRecord {
    pub fn new(about: AgentId, trait_name: impl Into<String>, value: f64) -> Self {
        Self {
            about,
            trait_name: trait_name.into(),
            value: value.clamp(0.0, 1.0),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}
