//! Decision output: ranked possibilities and the handoff back to the world.

use serde::{Deserialize, Serialize};
use sim_world::{AgentId, EventKind, WorldEvent};
use std::cmp::Ordering;

use crate::atoms::{Atom, AtomKind, AtomSet};

/// One ranked possibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub atom_id: String,
    pub action: String,
    pub target: Option<AgentId>,
    pub score: f64,
}

impl Candidate {
    /// Reads a `poss:<action>:<self>[:<target>]` atom.
    pub fn from_atom(atom: &Atom) -> Option<Self> {
        if atom.kind != AtomKind::Possibility {
            return None;
        }
        Some(Self {
            atom_id: atom.id_str(),
            action: atom.id.head().to_string(),
            target: atom.target().map(AgentId::from),
            score: atom.magnitude,
        })
    }
}

/// Highest score first, then atom id.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.atom_id.cmp(&b.atom_id))
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub agent: AgentId,
    pub tick: u64,
    /// Every possibility, ranked.
    pub candidates: Vec<Candidate>,
    pub chosen: Candidate,
}

impl Decision {
    /// Rank the agent's possibilities. `None` when there are none.
    pub fn from_atoms(atoms: &AtomSet, agent: &AgentId, tick: u64) -> Option<Self> {
        let mut candidates: Vec<Candidate> = atoms
            .with_prefix("poss:")
            .filter(|a| a.subject() == Some(agent.as_str()))
            .filter_map(Candidate::from_atom)
            .collect();
        rank(&mut candidates);
        let chosen = candidates.first()?.clone();
        Some(Self {
            agent: agent.clone(),
            tick,
            candidates,
            chosen,
        })
    }

    /// The chosen action as an event the world can schedule.
    pub fn to_world_event(&self, next_tick: u64) -> WorldEvent {
        let event = WorldEvent::new(
            next_tick,
            EventKind::Action {
                action: self.chosen.action.clone(),
            },
            self.agent.clone(),
        );
        let event = match &self.chosen.target {
            Some(target) => event.with_target(target.clone()),
            None => event,
        };
        event.with_intensity(self.chosen.score)
    }
}
