//! Tick driver: runs every agent's pipeline against the world and feeds the
//! chosen actions back as scheduled events.

use serde::{Deserialize, Serialize};
use sim_world::{AgentId, WorldSnapshot};
use tracing::info;

use crate::config::EngineConfig;
use crate::decision::Decision;
use crate::error::{MindError, MindResult};
use crate::pipeline::{run_pipeline, PipelineInput, PipelineResult};
use crate::session::SimulationSession;

/// One agent's outcome for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTick {
    pub agent: AgentId,
    pub atom_count: usize,
    pub error_count: usize,
    pub decision: Option<Decision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// The tick the agents reasoned about.
    pub tick: u64,
    pub agents: Vec<AgentTick>,
    /// Scheduled events delivered when the world advanced.
    pub delivered: usize,
}

impl TickReport {
    pub fn decision(&self, agent: &AgentId) -> Option<&Decision> {
        self.agents
            .iter()
            .find(|a| &a.agent == agent)
            .and_then(|a| a.decision.as_ref())
    }
}

/// A world, the session carried across its ticks, and the engine config.
#[derive(Debug, Clone)]
pub struct Simulation {
    world: WorldSnapshot,
    session: SimulationSession,
    config: EngineConfig,
}

impl Simulation {
    pub fn new(world: WorldSnapshot, config: EngineConfig) -> MindResult<Self> {
        config.validate()?;
        Ok(Self {
            world,
            session: SimulationSession::new(),
            config,
        })
    }

    pub fn world(&self) -> &WorldSnapshot {
        &self.world
    }

    pub fn session(&self) -> &SimulationSession {
        &self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reason for every agent in id order, schedule their decisions for the
    /// next tick, then advance the world.
    ///
    /// Agents all see the world as it was at the start of the tick.
    pub fn step(&mut self) -> MindResult<TickReport> {
        let tick = self.world.tick;
        let agents: Vec<AgentId> = self.world.agents.keys().cloned().collect();
        let mut input = PipelineInput::new("_").with_world(self.world.clone());
        let mut report = TickReport {
            tick,
            agents: Vec::with_capacity(agents.len()),
            delivered: 0,
        };

        for agent in agents {
            input.self_id = agent.clone();
            let result = run_pipeline(&input, &mut self.session, &self.config)?;
            report.agents.push(AgentTick {
                agent,
                atom_count: result.atoms.len(),
                error_count: result.validation.errors().count(),
                decision: result.decision,
            });
        }

        for decision in report.agents.iter().filter_map(|a| a.decision.as_ref()) {
            self.world.schedule(decision.to_world_event(tick + 1));
        }
        report.delivered = self.world.advance();

        info!(
            tick,
            agents = report.agents.len(),
            decisions = report.agents.iter().filter(|a| a.decision.is_some()).count(),
            delivered = report.delivered,
            "tick complete"
        );
        Ok(report)
    }

    pub fn run(&mut self, ticks: usize) -> MindResult<Vec<TickReport>> {
        (0..ticks).map(|_| self.step()).collect()
    }

    /// Evaluate one agent against the current world without touching the
    /// session.
    pub fn evaluate(&self, agent: &AgentId) -> MindResult<PipelineResult> {
        if self.world.get_agent(agent).is_none() {
            return Err(MindError::UnknownAgent(agent.to_string()));
        }
        let mut session = self.session.clone();
        let input = PipelineInput::new(agent.clone()).with_world(self.world.clone());
        run_pipeline(&input, &mut session, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::AtomKey;
    use sim_world::{Agent, EventKind, Position, Relationship, WorldEvent};

    fn standoff() -> WorldSnapshot {
        let mut world = WorldSnapshot::new();
        let a = world.add_agent(Agent::new("A", "Ada"));
        let b = world.add_agent(Agent::new("B", "Bo"));
        world.set_position(&a, Position::new(0, 0)).unwrap();
        world.set_position(&b, Position::new(1, 0)).unwrap();
        world.set_relationship(Relationship::new(a.clone(), b.clone()).with_trust(0.2).with_hostility(0.6));
        world.set_relationship(Relationship::new(b.clone(), a.clone()).with_trust(0.8).with_closeness(0.5));
        world.events.push(WorldEvent::new(0, EventKind::Threaten, b).with_target(a).with_intensity(0.9));
        world
    }

    #[test]
    fn test_step_schedules_and_advances() {
        let mut sim = Simulation::new(standoff(), EngineConfig::default()).unwrap();
        let report = sim.step().unwrap();
        assert_eq!(report.tick, 0);
        assert_eq!(report.agents.len(), 2);
        assert_eq!(sim.world().tick, 1);

        let decided = report.agents.iter().filter(|a| a.decision.is_some()).count();
        assert_eq!(report.delivered, decided);
        assert!(decided > 0);
        let actions = sim
            .world()
            .events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Action { .. }))
            .count();
        assert_eq!(actions, decided);
        assert!(sim.world().scheduled.is_empty());
    }

    #[test]
    fn test_session_carries_goals_across_ticks() {
        let mut sim = Simulation::new(standoff(), EngineConfig::default()).unwrap();
        let reports = sim.run(3).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(sim.world().tick, 3);
        let a = AgentId::new("A");
        assert!(!sim.session().previously_active(&a).is_empty());
        let state = sim
            .session()
            .goal_states(&a)
            .and_then(|states| states.values().find(|s| s.last_active_tick.is_some()))
            .copied();
        assert!(state.map_or(false, |s| s.lock_in > 0.0));
    }

    #[test]
    fn test_evaluate_leaves_session_alone() {
        let sim = Simulation::new(standoff(), EngineConfig::default()).unwrap();
        let result = sim.evaluate(&AgentId::new("A")).unwrap();
        assert!(result.value(&AtomKey::threat("social", "A")).unwrap() > 0.0);
        assert_eq!(sim.session(), &SimulationSession::new());

        let err = sim.evaluate(&AgentId::new("Z")).unwrap_err();
        assert!(matches!(err, MindError::UnknownAgent(_)));
    }
}
