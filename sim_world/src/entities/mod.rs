//! Agent definitions for the simulated world.

mod agent;
mod components;

pub use agent::*;
pub use components::*;

use serde::{Deserialize, Serialize};

/// Identifier for an agent.
///
/// Agent ids are embedded inside colon-delimited atom ids, so they never
/// contain `:` and are never empty. [`AgentId::new`] enforces both.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create an agent id, replacing any `:` with `_`.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let cleaned: String = raw.trim().replace(':', "_");
        if cleaned.is_empty() {
            Self("_".to_string())
        } else {
            Self(cleaned)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for AgentId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_strips_colons() {
        assert_eq!(AgentId::new("a:b").as_str(), "a_b");
        assert_eq!(AgentId::new("  ").as_str(), "_");
        assert_eq!(AgentId::from("A").to_string(), "A");
    }
}
