//! World mechanics: events, scheduled actions and scene controls.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::AgentId;

/// Unique identifier for world events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Attack,
    Threaten,
    Help,
    ShareInfo,
    Deceive,
    Talk,
    /// An agent carried out a chosen action (the handoff from a decision).
    Action { action: String },
}

/// Whether an event reads as hostile or helpful to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventValence {
    Hostile,
    Helpful,
    Neutral,
}

impl EventKind {
    pub fn valence(&self) -> EventValence {
        match self {
            EventKind::Attack | EventKind::Threaten | EventKind::Deceive => EventValence::Hostile,
            EventKind::Help | EventKind::ShareInfo => EventValence::Helpful,
            EventKind::Talk => EventValence::Neutral,
            EventKind::Action { action } => match action.as_str() {
                "confront" => EventValence::Hostile,
                "assist" | "share_info" => EventValence::Helpful,
                _ => EventValence::Neutral,
            },
        }
    }
}

/// A single entry in the world event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEvent {
    pub id: EventId,
    pub tick: u64,
    pub kind: EventKind,
    pub actor: AgentId,
    pub target: Option<AgentId>,
    /// Strength of the event from 0.0 to 1.0.
    pub intensity: f64,
}

impl WorldEvent {
    pub fn new(tick: u64, kind: EventKind, actor: AgentId) -> Self {
        Self {
            id: EventId::new(),
            tick,
            kind,
            actor,
            target: None,
            intensity: 1.0,
        }
    }

    pub fn with_target(mut self, target: AgentId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity.clamp(0.0, 1.0);
        self
    }

    /// Age of this event relative to `now`, saturating at zero for future events.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.tick)
    }
}

/// Scene-level control parameters set by the caller, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneControls {
    pub time_pressure: f64,
    pub norm_pressure: f64,
    pub publicness: f64,
    pub scarcity: f64,
}

impl Default for SceneControls {
    fn default() -> Self {
        Self {
            time_pressure: 0.0,
            norm_pressure: 0.0,
            publicness: 0.5,
            scarcity: 0.0,
        }
    }
}
