//! Agent definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AgentId, BeliefRecord, BodyState, Traits};

/// A simulated agent with all components the mind core reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,

    #[serde(default)]
    pub traits: Traits,
    #[serde(default)]
    pub body: BodyState,
    #[serde(default)]
    pub beliefs: Vec<BeliefRecord>,

    // Free-form data carried through for external tooling
    #[serde(default)]
    pub extra_components: BTreeMap<String, serde_json::Value>,
}

impl Agent {
    /// Create a new agent with neutral traits and a healthy body.
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            traits: Traits::default(),
            body: BodyState::default(),
            beliefs: Vec::new(),
            extra_components: BTreeMap::new(),
        }
    }

    pub fn with_traits(mut self, traits: Traits) -> Self {
        self.traits = traits;
        self
    }

    pub fn with_body(mut self, body: BodyState) -> Self {
        self.body = body;
        self
    }

    pub fn with_belief(mut self, belief: BeliefRecord) -> Self {
        self.beliefs.push(belief);
        self
    }

    /// Check if the agent is alive.
    pub fn is_alive(&self) -> bool {
        self.body.health > 0.0
    }

    /// Beliefs held about a specific other agent.
    pub fn beliefs_about<'a>(&'a self, other: &'a AgentId) -> impl Iterator<Item = &'a BeliefRecord> {
        self.beliefs.iter().filter(move |b| &b.about == other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_agent() {
        let agent = Agent::new("A", "Ada");
        assert_eq!(agent.name, "Ada");
        assert_eq!(agent.id.as_str(), "A");
        assert!(agent.is_alive());
        assert!(agent.beliefs.is_empty());
    }

    #[test]
    fn test_agent_death() {
        let mut agent = Agent::new("A", "Doomed");
        agent.body.health = 0.0;
        assert!(!agent.is_alive());
    }

    #[test]
    fn test_beliefs_about() {
        let b = AgentId::new("B");
        let c = AgentId::new("C");
        let agent = Agent::new("A", "Ada")
            .with_belief(BeliefRecord::new(b.clone(), "helpfulness", 0.8))
            .with_belief(BeliefRecord::new(c, "harmfulness", 0.3));

        assert_eq!(agent.beliefs_about(&b).count(), 1);
    }
}
