//! Dependency graph over atoms.
//!
//! The graph consists of:
//! - **Nodes**: atom ids present in a set
//! - **Edges**: `used → derived`, read from each atom's trace
//! - **Missing refs**: inputs named in traces but absent from the set (gated
//!   or external facts; not an error)
//!
//! Submodules hold the signal field and the energy propagation built on top.

mod energy;
mod signal;

pub use energy::*;
pub use signal::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::atoms::AtomSet;

/// Maximum number of node ids reported in a cycle sample.
pub const CYCLE_SAMPLE_LIMIT: usize = 16;

/// Result of a topological sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopoResult {
    pub ok: bool,
    pub order: Vec<String>,
    /// Some of the nodes left unordered when a cycle blocks the sort.
    pub cycle_sample: Vec<String>,
}

/// The dependency DAG of an atom set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AtomGraph {
    nodes: BTreeSet<String>,

    /// Input id -> atoms derived from it.
    out: BTreeMap<String, BTreeSet<String>>,

    /// Derived id -> its inputs present in the graph.
    into: BTreeMap<String, BTreeSet<String>>,

    /// Referenced in a trace but not present.
    missing: BTreeSet<String>,
}

impl AtomGraph {
    /// Build the graph from every trace in the set.
    pub fn build(set: &AtomSet) -> Self {
        let mut graph = Self::default();

        for id in set.ids() {
            graph.nodes.insert(id.clone());
        }

        for atom in set.iter() {
            let id = atom.id_str();
            for used in atom.used_ids() {
                if set.contains(used) {
                    graph.out.entry(used.clone()).or_default().insert(id.clone());
                    graph.into.entry(id.clone()).or_default().insert(used.clone());
                } else {
                    graph.missing.insert(used.clone());
                }
            }
        }

        graph
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out.values().map(BTreeSet::len).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.nodes.iter()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    /// Atoms derived directly from `id`.
    pub fn dependents(&self, id: &str) -> impl Iterator<Item = &String> {
        self.out.get(id).into_iter().flat_map(|s| s.iter())
    }

    /// Inputs of `id` that are present in the graph.
    pub fn dependencies(&self, id: &str) -> impl Iterator<Item = &String> {
        self.into.get(id).into_iter().flat_map(|s| s.iter())
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.out.get(id).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn missing(&self) -> &BTreeSet<String> {
        &self.missing
    }

    /// Kahn's algorithm with an id-sorted ready queue.
    ///
    /// If the queue empties before every node is ordered, the remaining
    /// nodes sit on or behind a cycle; a bounded sample of them is reported.
    pub fn topo_order(&self) -> TopoResult {
        let mut indegree: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.into.get(n).map(BTreeSet::len).unwrap_or(0)))
            .collect();

        let mut ready: BTreeSet<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            order.push(node.to_string());
            for next in self.dependents(node) {
                if let Some(d) = indegree.get_mut(next.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(next.as_str());
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            return TopoResult {
                ok: true,
                order,
                cycle_sample: Vec::new(),
            };
        }

        let cycle_sample = indegree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(n, _)| n.to_string())
            .take(CYCLE_SAMPLE_LIMIT)
            .collect();

        TopoResult {
            ok: false,
            order,
            cycle_sample,
        }
    }

    /// Every input that transitively feeds `id`.
    pub fn ancestors(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&String> = self.dependencies(id).collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                stack.extend(self.dependencies(next));
            }
        }
        seen
    }
}
