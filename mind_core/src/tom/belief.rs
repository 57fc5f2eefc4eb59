//! Log-odds belief updates about another agent's latent traits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::TomConfig;
use crate::math::{centered, clamp01, logit, sigmoid};

/// Latent traits inferred about another agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatentTrait {
    Helpfulness,
    Harmfulness,
    Truthfulness,
}

impl LatentTrait {
    pub const ALL: [LatentTrait; 3] = [
        LatentTrait::Helpfulness,
        LatentTrait::Harmfulness,
        LatentTrait::Truthfulness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LatentTrait::Helpfulness => "helpfulness",
            LatentTrait::Harmfulness => "harmfulness",
            LatentTrait::Truthfulness => "truthfulness",
        }
    }

    pub fn default_prior(&self, config: &TomConfig) -> f64 {
        match self {
            LatentTrait::Helpfulness => config.prior_helpfulness,
            LatentTrait::Harmfulness => config.prior_harmfulness,
            LatentTrait::Truthfulness => config.prior_truthfulness,
        }
    }

    /// Evidence weight of each centered dyad feature for this trait.
    fn weights(&self) -> [(DyadFeature, f64); 5] {
        use DyadFeature::*;
        match self {
            LatentTrait::Helpfulness => [
                (Trust, 0.9),
                (Threat, -0.7),
                (Support, 1.0),
                (Alignment, 0.6),
                (Familiarity, 0.2),
            ],
            LatentTrait::Harmfulness => [
                (Trust, -0.6),
                (Threat, 1.2),
                (Support, -0.3),
                (Alignment, -0.5),
                (Familiarity, -0.1),
            ],
            LatentTrait::Truthfulness => [
                (Trust, 1.0),
                (Threat, -0.4),
                (Support, 0.1),
                (Alignment, 0.5),
                (Familiarity, 0.3),
            ],
        }
    }
}

/// Dyad metrics read from `tom:dyad:<self>:<other>:<metric>` atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DyadFeature {
    Trust,
    Threat,
    Support,
    Alignment,
    Familiarity,
}

impl DyadFeature {
    pub const ALL: [DyadFeature; 5] = [
        DyadFeature::Trust,
        DyadFeature::Threat,
        DyadFeature::Support,
        DyadFeature::Alignment,
        DyadFeature::Familiarity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DyadFeature::Trust => "trust",
            DyadFeature::Threat => "threat",
            DyadFeature::Support => "support",
            DyadFeature::Alignment => "alignment",
            DyadFeature::Familiarity => "familiarity",
        }
    }
}

/// The observed dyad metrics for one pair. Absent metrics contribute no evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DyadFeatures {
    pub values: BTreeMap<DyadFeature, f64>,
}

impl DyadFeatures {
    pub fn set(&mut self, feature: DyadFeature, value: f64) {
        self.values.insert(feature, clamp01(value));
    }

    pub fn with(mut self, feature: DyadFeature, value: f64) -> Self {
        self.set(feature, value);
        self
    }

    pub fn get(&self, feature: DyadFeature) -> Option<f64> {
        self.values.get(&feature).copied()
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }
}

/// One trait's belief update with every intermediate quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefPosterior {
    pub latent: LatentTrait,
    pub prior: f64,
    pub prior_logit: f64,
    /// Weighted sum of centered features.
    pub evidence: f64,
    /// Per-feature share of the evidence.
    pub contributions: BTreeMap<String, f64>,
    pub precision: f64,
    pub posterior_logit: f64,
    pub posterior: f64,
}

/// Update one trait belief in log-odds space.
pub fn update_belief(
    latent: LatentTrait,
    prior: f64,
    features: &DyadFeatures,
    precision: f64,
) -> BeliefPosterior {
    let prior = clamp01(prior);
    let prior_logit = logit(prior);

    let mut contributions = BTreeMap::new();
    let mut evidence = 0.0;
    for (feature, weight) in latent.weights() {
        if let Some(value) = features.get(feature) {
            let contribution = weight * centered(value);
            contributions.insert(feature.as_str().to_string(), contribution);
            evidence += contribution;
        }
    }

    let posterior_logit = prior_logit + precision * evidence;
    BeliefPosterior {
        latent,
        prior,
        prior_logit,
        evidence,
        contributions,
        precision,
        posterior_logit,
        posterior: sigmoid(posterior_logit),
    }
}

/// Update all latent traits; `priors` overrides the configured defaults.
pub fn update_beliefs(
    features: &DyadFeatures,
    priors: &BTreeMap<LatentTrait, f64>,
    s2: f64,
    config: &TomConfig,
) -> BTreeMap<LatentTrait, BeliefPosterior> {
    let precision = config.precision(s2);
    LatentTrait::ALL
        .iter()
        .map(|latent| {
            let prior = priors
                .get(latent)
                .copied()
                .unwrap_or_else(|| latent.default_prior(config));
            (*latent, update_belief(*latent, prior, features, precision))
        })
        .collect()
}
