//! World snapshot - the complete input the mind core reads each tick.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{Agent, AgentId};
use crate::error::{WorldError, WorldResult};
use crate::mechanics::{SceneControls, WorldEvent};

/// Grid position of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in cells.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A single map cell, all values in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapCell {
    pub hazard: f64,
    pub cover: f64,
    pub visibility: f64,
    /// Whether the cell is out of public view.
    pub private: bool,
}

impl Default for MapCell {
    fn default() -> Self {
        Self {
            hazard: 0.0,
            cover: 0.0,
            visibility: 1.0,
            private: false,
        }
    }
}

/// Row-major grid of cells.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorldMap {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<MapCell>,
}

impl WorldMap {
    /// Create a map filled with default cells.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![MapCell::default(); (width as usize) * (height as usize)],
        }
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width || pos.y as u32 >= self.height {
            return None;
        }
        Some(pos.y as usize * self.width as usize + pos.x as usize)
    }

    /// Get the cell at a position, if on the map.
    pub fn cell(&self, pos: Position) -> Option<&MapCell> {
        self.index(pos).and_then(|i| self.cells.get(i))
    }

    /// Replace the cell at a position.
    pub fn set_cell(&mut self, pos: Position, cell: MapCell) -> WorldResult<()> {
        let idx = self.index(pos).ok_or(WorldError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width: self.width,
            height: self.height,
        })?;
        match self.cells.get_mut(idx) {
            Some(slot) => {
                *slot = cell;
                Ok(())
            }
            None => Err(WorldError::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.width,
                height: self.height,
            }),
        }
    }
}

/// Directed relationship edge: how `from` regards `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: AgentId,
    pub to: AgentId,
    #[serde(default = "neutral")]
    pub trust: f64,
    #[serde(default)]
    pub hostility: f64,
    #[serde(default)]
    pub closeness: f64,
}

fn neutral() -> f64 {
    0.5
}

impl Relationship {
    pub fn new(from: AgentId, to: AgentId) -> Self {
        Self {
            from,
            to,
            trust: 0.5,
            hostility: 0.0,
            closeness: 0.0,
        }
    }

    pub fn with_trust(mut self, trust: f64) -> Self {
        self.trust = trust.clamp(0.0, 1.0);
        self
    }

    pub fn with_hostility(mut self, hostility: f64) -> Self {
        self.hostility = hostility.clamp(0.0, 1.0);
        self
    }

    pub fn with_closeness(mut self, closeness: f64) -> Self {
        self.closeness = closeness.clamp(0.0, 1.0);
        self
    }
}

/// The complete state of the world at one tick.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorldSnapshot {
    pub tick: u64,

    #[serde(default)]
    pub agents: BTreeMap<AgentId, Agent>,

    #[serde(default)]
    pub positions: BTreeMap<AgentId, Position>,

    #[serde(default)]
    pub map: Option<WorldMap>,

    /// Events that already happened, oldest first.
    #[serde(default)]
    pub events: Vec<WorldEvent>,

    /// Events queued for a future tick.
    #[serde(default)]
    pub scheduled: Vec<WorldEvent>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,

    #[serde(default)]
    pub scene: Option<SceneControls>,
}

impl WorldSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a snapshot from JSON.
    pub fn from_json(text: &str) -> WorldResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a hand-written scenario from TOML.
    pub fn from_toml(text: &str) -> WorldResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Add an agent to the world.
    pub fn add_agent(&mut self, agent: Agent) -> AgentId {
        let id = agent.id.clone();
        self.agents.insert(id.clone(), agent);
        id
    }

    pub fn get_agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Place an agent at a position.
    pub fn set_position(&mut self, id: &AgentId, pos: Position) -> WorldResult<()> {
        if !self.agents.contains_key(id) {
            return Err(WorldError::UnknownAgent(id.clone()));
        }
        self.positions.insert(id.clone(), pos);
        Ok(())
    }

    /// Cell under an agent, if both the position and the map are known.
    pub fn cell_of(&self, id: &AgentId) -> Option<&MapCell> {
        let pos = self.positions.get(id)?;
        self.map.as_ref()?.cell(*pos)
    }

    /// Distance between two agents, if both have a position.
    pub fn distance(&self, a: &AgentId, b: &AgentId) -> Option<f64> {
        let pa = self.positions.get(a)?;
        let pb = self.positions.get(b)?;
        Some(pa.distance(pb))
    }

    /// All other agents within `radius`, ordered by id.
    pub fn agents_near(&self, id: &AgentId, radius: f64) -> Vec<(AgentId, f64)> {
        self.positions
            .keys()
            .filter(|other| *other != id)
            .filter_map(|other| self.distance(id, other).map(|d| (other.clone(), d)))
            .filter(|(_, d)| *d <= radius)
            .collect()
    }

    /// How `from` regards `to`, if the relationship graph has an edge.
    pub fn relationship(&self, from: &AgentId, to: &AgentId) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|r| &r.from == from && &r.to == to)
    }

    /// Outgoing relationship edges of an agent.
    pub fn relationships_of<'a>(&'a self, from: &'a AgentId) -> impl Iterator<Item = &'a Relationship> {
        self.relationships.iter().filter(move |r| &r.from == from)
    }

    /// Add or replace a relationship edge.
    pub fn set_relationship(&mut self, relationship: Relationship) {
        self.relationships
            .retain(|r| !(r.from == relationship.from && r.to == relationship.to));
        self.relationships.push(relationship);
    }

    /// Events aimed at `target`, oldest first.
    pub fn events_targeting<'a>(&'a self, target: &'a AgentId) -> impl Iterator<Item = &'a WorldEvent> {
        self.events
            .iter()
            .filter(move |e| e.target.as_ref() == Some(target))
    }

    /// Queue an event for a future tick.
    pub fn schedule(&mut self, event: WorldEvent) {
        self.scheduled.push(event);
    }

    /// Advance one tick, moving every due scheduled event into the log.
    ///
    /// Returns the number of events that fired.
    pub fn advance(&mut self) -> usize {
        self.tick += 1;
        let now = self.tick;
        let (due, pending): (Vec<_>, Vec<_>) =
            self.scheduled.drain(..).partition(|e| e.tick <= now);
        self.scheduled = pending;
        let fired = due.len();
        self.events.extend(due);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanics::EventKind;

    fn two_agents() -> (WorldSnapshot, AgentId, AgentId) {
        let mut world = WorldSnapshot::new();
        let a = world.add_agent(Agent::new("A", "Ada"));
        let b = world.add_agent(Agent::new("B", "Bo"));
        (world, a, b)
    }

    #[test]
    fn test_distance_and_neighbours() {
        let (mut world, a, b) = two_agents();
        world.set_position(&a, Position::new(0, 0)).unwrap();
        world.set_position(&b, Position::new(3, 4)).unwrap();

        assert!((world.distance(&a, &b).unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(world.agents_near(&a, 5.0).len(), 1);
        assert!(world.agents_near(&a, 4.0).is_empty());
    }

    #[test]
    fn test_unknown_agent_position() {
        let mut world = WorldSnapshot::new();
        let result = world.set_position(&AgentId::new("ghost"), Position::new(0, 0));
        assert!(matches!(result, Err(WorldError::UnknownAgent(_))));
    }

    #[test]
    fn test_map_cells() {
        let mut map = WorldMap::new(2, 2);
        let hot = MapCell {
            hazard: 0.7,
            ..Default::default()
        };
        map.set_cell(Position::new(1, 1), hot).unwrap();

        assert_eq!(map.cell(Position::new(1, 1)).unwrap().hazard, 0.7);
        assert!(map.cell(Position::new(2, 0)).is_none());
        assert!(map.set_cell(Position::new(-1, 0), hot).is_err());
    }

    #[test]
    fn test_relationship_replace() {
        let (mut world, a, b) = two_agents();
        world.set_relationship(Relationship::new(a.clone(), b.clone()).with_trust(0.2));
        world.set_relationship(Relationship::new(a.clone(), b.clone()).with_trust(0.9));

        assert_eq!(world.relationships.len(), 1);
        assert_eq!(world.relationship(&a, &b).unwrap().trust, 0.9);
        assert!(world.relationship(&b, &a).is_none());
    }

    #[test]
    fn test_schedule_and_advance() {
        let (mut world, a, b) = two_agents();
        world.schedule(WorldEvent::new(1, EventKind::Help, a.clone()).with_target(b.clone()));
        world.schedule(WorldEvent::new(3, EventKind::Talk, a));

        assert_eq!(world.advance(), 1);
        assert_eq!(world.tick, 1);
        assert_eq!(world.events.len(), 1);
        assert_eq!(world.scheduled.len(), 1);
        assert_eq!(world.events_targeting(&b).count(), 1);
    }

    #[test]
    fn test_from_json_defaults() {
        let world = WorldSnapshot::from_json(r#"{"tick": 4}"#).unwrap();
        assert_eq!(world.tick, 4);
        assert!(world.agents.is_empty());
        assert!(world.map.is_none());
    }

    #[test]
    fn test_from_toml_scenario() {
        let world = WorldSnapshot::from_toml(
            r#"
            tick = 2

            [agents.A]
            id = "A"
            name = "Ada"

            [agents.A.traits]
            paranoia = 0.8

            [positions.A]
            x = 1
            y = 2

            [[relationships]]
            from = "A"
            to = "B"
            hostility = 0.4
            "#,
        )
        .unwrap();
        let a = AgentId::new("A");
        assert_eq!(world.tick, 2);
        assert_eq!(world.get_agent(&a).unwrap().traits.paranoia, 0.8);
        assert_eq!(world.positions.get(&a), Some(&Position::new(1, 2)));
        let rel = world.relationship(&a, &AgentId::new("B")).unwrap();
        assert_eq!(rel.trust, 0.5);
        assert_eq!(rel.hostility, 0.4);

        assert!(matches!(
            WorldSnapshot::from_toml("tick = \"soon\""),
            Err(WorldError::TomlDecode(_))
        ));
    }
}
