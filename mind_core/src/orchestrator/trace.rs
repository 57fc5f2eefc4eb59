//! Versioned orchestrator trace.

use serde::{Deserialize, Serialize};
use sim_world::AgentId;
use uuid::Uuid;

use crate::error::MindResult;
use crate::pipeline::StageId;

pub const TRACE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

/// One atom changed by one producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomChange {
    pub atom_id: String,
    pub kind: ChangeKind,
    pub stage_id: StageId,
    pub producer: String,
    pub before: Option<f64>,
    pub after: Option<f64>,
}

impl AtomChange {
    /// Magnitude change, absent values counting as 0.
    pub fn delta(&self) -> f64 {
        self.after.unwrap_or(0.0) - self.before.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProducerOutputs {
    pub atoms_added: Vec<String>,
    pub atoms_updated: Vec<String>,
    pub atoms_removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerTrace {
    pub name: String,
    pub priority: i32,
    /// Working-set atoms the patch's atoms were derived from.
    pub input_refs: Vec<String>,
    pub outputs: ProducerOutputs,
    pub why: Vec<String>,
    /// Set when the producer failed and its patch was discarded.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage_id: StageId,
    pub producers: Vec<ProducerTrace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorTraceV1 {
    pub version: u32,
    pub run_id: Uuid,
    pub agent: AgentId,
    pub tick: u64,
    pub stages: Vec<StageTrace>,
    /// Sorted by atom id, then stage order.
    pub atom_changes: Vec<AtomChange>,
    /// The largest changes, one line each.
    pub summary: Vec<String>,
    pub log: Vec<String>,
}

impl OrchestratorTraceV1 {
    pub fn new(agent: AgentId, tick: u64) -> Self {
        Self {
            version: TRACE_VERSION,
            run_id: Uuid::new_v4(),
            agent,
            tick,
            stages: Vec::new(),
            atom_changes: Vec::new(),
            summary: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Trace of `stage`, created on first use.
    pub fn stage_mut(&mut self, stage_id: StageId) -> &mut StageTrace {
        let index = match self.stages.iter().position(|s| s.stage_id == stage_id) {
            Some(index) => index,
            None => {
                self.stages.push(StageTrace {
                    stage_id,
                    producers: Vec::new(),
                });
                self.stages.len() - 1
            }
        };
        &mut self.stages[index]
    }

    pub fn producer(&self, name: &str) -> Option<&ProducerTrace> {
        self.stages
            .iter()
            .flat_map(|s| s.producers.iter())
            .find(|p| p.name == name)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ProducerTrace> {
        self.stages
            .iter()
            .flat_map(|s| s.producers.iter())
            .filter(|p| p.error.is_some())
    }

    /// Sort changes and write the top-`n` summary.
    pub fn finish(&mut self, top_n: usize) {
        self.atom_changes.sort_by(|a, b| {
            a.atom_id
                .cmp(&b.atom_id)
                .then_with(|| a.stage_id.order().cmp(&b.stage_id.order()))
        });

        let mut largest: Vec<&AtomChange> = self.atom_changes.iter().collect();
        largest.sort_by(|a, b| {
            b.delta()
                .abs()
                .partial_cmp(&a.delta().abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.atom_id.cmp(&b.atom_id))
        });
        self.summary = largest
            .into_iter()
            .take(top_n)
            .map(|c| {
                format!(
                    "{} {:?} by {}: {} -> {} ({:+.3})",
                    c.atom_id,
                    c.kind,
                    c.producer,
                    fmt_value(c.before),
                    fmt_value(c.after),
                    c.delta()
                )
            })
            .collect();
    }

    pub fn to_json(&self) -> MindResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> MindResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}
