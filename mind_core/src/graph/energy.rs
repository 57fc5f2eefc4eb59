//! Energy propagation over the dependency graph.
//!
//! The algorithm works as follows:
//! 1. **Seed**: each channel source starts with energy = magnitude x confidence
//! 2. **Split**: every step, a node keeps `decay` of its energy and injects
//!    the rest equally into its dependents; sinks keep everything
//! 3. **Attribute**: alongside the energy, each node carries a map from seed
//!    id to contribution, pruned to the top K after every step
//!
//! Total energy is conserved at every step. All maps are id-ordered, so the
//! result is identical for identical inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AtomGraph, ChannelKind, SignalField};
use crate::error::{MindError, MindResult};

/// Configuration for energy propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Number of diffusion steps.
    pub steps: u32,

    /// Fraction of a node's energy it retains each step (0.0-1.0).
    pub decay: f64,

    /// Attribution entries kept per node.
    pub top_k: usize,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            steps: 4,
            decay: 0.35,
            top_k: 8,
        }
    }
}

impl EnergyConfig {
    pub fn validate(&self) -> MindResult<()> {
        if !(0.0..=1.0).contains(&self.decay) {
            return Err(MindError::Config(format!("energy.decay {} outside [0, 1]", self.decay)));
        }
        if self.top_k == 0 {
            return Err(MindError::Config("energy.top_k must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Energy held by each node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EnergyState {
    energies: BTreeMap<String, f64>,
}

impl EnergyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add energy to a node (accumulates with existing energy).
    pub fn add_energy(&mut self, node: &str, energy: f64) {
        *self.energies.entry(node.to_string()).or_insert(0.0) += energy;
    }

    pub fn get_energy(&self, node: &str) -> f64 {
        self.energies.get(node).copied().unwrap_or(0.0)
    }

    /// Nodes with energy at or above the threshold, hottest first; ties by id.
    pub fn hot_nodes(&self, threshold: f64) -> Vec<(&String, f64)> {
        let mut nodes: Vec<_> = self
            .energies
            .iter()
            .filter(|(_, e)| **e >= threshold)
            .map(|(n, e)| (n, *e))
            .collect();
        nodes.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        nodes
    }

    pub fn total_energy(&self) -> f64 {
        self.energies.values().sum()
    }

    pub fn iter_energies(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.energies.iter()
    }
}

/// Seed id -> contribution, for one node.
pub type Attribution = BTreeMap<String, f64>;

/// Propagation result for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEnergy {
    pub channel: ChannelKind,
    pub seeded_total: f64,
    pub state: EnergyState,
    pub attribution: BTreeMap<String, Attribution>,
}

impl ChannelEnergy {
    /// The seeds contributing most to `node`, largest first; ties by id.
    pub fn top_drivers(&self, node: &str, n: usize) -> Vec<(String, f64)> {
        let mut drivers: Vec<(String, f64)> = self
            .attribution
            .get(node)
            .map(|a| a.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        sort_contributions(&mut drivers);
        drivers.truncate(n);
        drivers
    }
}

/// Propagation result for every channel of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EnergyResult {
    pub channels: BTreeMap<ChannelKind, ChannelEnergy>,
}

impl EnergyResult {
    pub fn channel(&self, kind: ChannelKind) -> Option<&ChannelEnergy> {
        self.channels.get(&kind)
    }
}

fn sort_contributions(list: &mut [(String, f64)]) {
    list.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

fn prune_top_k(attribution: Attribution, k: usize) -> Attribution {
    if attribution.len() <= k {
        return attribution;
    }
    let mut entries: Vec<(String, f64)> = attribution.into_iter().collect();
    sort_contributions(&mut entries);
    entries.truncate(k);
    entries.into_iter().collect()
}

fn deposit(
    energies: &mut BTreeMap<String, f64>,
    attribution: &mut BTreeMap<String, Attribution>,
    node: &str,
    amount: f64,
    source: &Attribution,
    fraction: f64,
) {
    *energies.entry(node.to_string()).or_insert(0.0) += amount;
    let slot = attribution.entry(node.to_string()).or_default();
    for (seed, contribution) in source {
        *slot.entry(seed.clone()).or_insert(0.0) += contribution * fraction;
    }
}

/// Diffuse every channel of `field` across `graph`.
pub fn propagate(graph: &AtomGraph, field: &SignalField, config: &EnergyConfig) -> EnergyResult {
    let decay = config.decay.clamp(0.0, 1.0);
    let mut result = EnergyResult::default();

    for channel in field.channels() {
        let mut energies: BTreeMap<String, f64> = BTreeMap::new();
        let mut attribution: BTreeMap<String, Attribution> = BTreeMap::new();

        for (id, weight) in &channel.sources {
            *energies.entry(id.clone()).or_insert(0.0) += weight;
            attribution
                .entry(id.clone())
                .or_default()
                .insert(id.clone(), *weight);
        }
        let seeded_total: f64 = energies.values().sum();

        for _step in 0..config.steps {
            let mut next_energies = BTreeMap::new();
            let mut next_attribution = BTreeMap::new();

            for (node, energy) in &energies {
                let empty = Attribution::new();
                let source = attribution.get(node).unwrap_or(&empty);
                let dependents: Vec<&String> = graph.dependents(node).collect();

                if dependents.is_empty() {
                    deposit(&mut next_energies, &mut next_attribution, node, *energy, source, 1.0);
                    continue;
                }

                deposit(
                    &mut next_energies,
                    &mut next_attribution,
                    node,
                    energy * decay,
                    source,
                    decay,
                );
                let share = (1.0 - decay) / dependents.len() as f64;
                for dependent in dependents {
                    deposit(
                        &mut next_energies,
                        &mut next_attribution,
                        dependent,
                        energy * share,
                        source,
                        share,
                    );
                }
            }

            energies = next_energies;
            attribution = next_attribution
                .into_iter()
                .map(|(node, a)| (node, prune_top_k(a, config.top_k)))
                .collect();
        }

        let mut state = EnergyState::new();
        for (node, energy) in &energies {
            state.add_energy(node, *energy);
        }

        result.channels.insert(
            channel.kind,
            ChannelEnergy {
                channel: channel.kind,
                seeded_total,
                state,
                attribution,
            },
        );
    }

    result
}
