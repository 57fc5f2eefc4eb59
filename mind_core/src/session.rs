//! Cross-tick state owned by the caller.

use serde::{Deserialize, Serialize};
use sim_world::AgentId;
use std::collections::{BTreeMap, BTreeSet};

use crate::goals::{GoalDomain, GoalState};

/// The only mutable state carried between ticks: per-(agent, domain) goal
/// states and each agent's previously active goal set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationSession {
    goal_states: BTreeMap<AgentId, BTreeMap<GoalDomain, GoalState>>,
    active_goals: BTreeMap<AgentId, BTreeSet<GoalDomain>>,
}

impl SimulationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a domain, neutral if never evaluated.
    pub fn goal_state(&self, agent: &AgentId, domain: GoalDomain) -> GoalState {
        self.goal_states
            .get(agent)
            .and_then(|states| states.get(&domain))
            .copied()
            .unwrap_or_default()
    }

    pub fn goal_states(&self, agent: &AgentId) -> Option<&BTreeMap<GoalDomain, GoalState>> {
        self.goal_states.get(agent)
    }

    pub fn lock_in(&self, agent: &AgentId) -> BTreeMap<GoalDomain, f64> {
        self.goal_states
            .get(agent)
            .map(|states| states.iter().map(|(d, s)| (*d, s.lock_in)).collect())
            .unwrap_or_default()
    }

    pub fn previously_active(&self, agent: &AgentId) -> BTreeSet<GoalDomain> {
        self.active_goals.get(agent).cloned().unwrap_or_default()
    }

    pub fn set_goal_state(&mut self, agent: &AgentId, domain: GoalDomain, state: GoalState) {
        self.goal_states
            .entry(agent.clone())
            .or_default()
            .insert(domain, state);
    }

    pub fn set_active(&mut self, agent: &AgentId, active: BTreeSet<GoalDomain>) {
        self.active_goals.insert(agent.clone(), active);
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentId> {
        self.goal_states.keys()
    }

    /// Forget everything about an agent.
    pub fn reset_agent(&mut self, agent: &AgentId) {
        self.goal_states.remove(agent);
        self.active_goals.remove(agent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_state_is_neutral() {
        let session = SimulationSession::new();
        let a = AgentId::new("A");
        assert_eq!(session.goal_state(&a, GoalDomain::Safety), GoalState::default());
        assert!(session.previously_active(&a).is_empty());
    }

    #[test]
    fn test_state_per_agent() {
        let mut session = SimulationSession::new();
        let a = AgentId::new("A");
        let b = AgentId::new("B");
        let state = GoalState {
            lock_in: 0.4,
            ..Default::default()
        };
        session.set_goal_state(&a, GoalDomain::Rest, state);
        session.set_active(&a, BTreeSet::from([GoalDomain::Rest]));

        assert_eq!(session.goal_state(&a, GoalDomain::Rest).lock_in, 0.4);
        assert_eq!(session.goal_state(&b, GoalDomain::Rest), GoalState::default());
        assert_eq!(session.lock_in(&a)[&GoalDomain::Rest], 0.4);

        session.reset_agent(&a);
        assert!(session.goal_states(&a).is_none());
        assert!(session.previously_active(&a).is_empty());
    }
}
