//! Staged inference pipeline.
//!
//! One agent-tick runs eight stages in a fixed order. Each stage reads the
//! atoms produced so far and emits new ones; the runner merges them with
//! "newer wins" and freezes the result before the next stage starts:
//!
//! ```text
//! world facts -> axes -> lens -> tom -> threat -> emotion -> goals -> possibilities
//! ```
//!
//! Manual override atoms are re-pinned after every stage so no derivation can
//! displace them.

mod axes;
mod emotion;
mod goals;
mod lens;
mod possibilities;
mod threat;
mod tom;
mod world_facts;

use serde::{Deserialize, Serialize};
use sim_world::{AgentId, SceneControls, WorldSnapshot};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::atoms::{
    auto_fix, merge_newer_wins, pin_overrides, validate_atoms, validate_set, Atom, AtomKey, AtomSet,
    Origin, ValidationIssue, ValidationReport,
};
use crate::config::EngineConfig;
use crate::decision::Decision;
use crate::error::MindResult;
use crate::session::SimulationSession;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    WorldFacts,
    Axes,
    Lens,
    Tom,
    Threat,
    Emotion,
    Goals,
    Possibilities,
}

impl StageId {
    pub const ALL: [StageId; 8] = [
        StageId::WorldFacts,
        StageId::Axes,
        StageId::Lens,
        StageId::Tom,
        StageId::Threat,
        StageId::Emotion,
        StageId::Goals,
        StageId::Possibilities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::WorldFacts => "world_facts",
            StageId::Axes => "axes",
            StageId::Lens => "lens",
            StageId::Tom => "tom",
            StageId::Threat => "threat",
            StageId::Emotion => "emotion",
            StageId::Goals => "goals",
            StageId::Possibilities => "possibilities",
        }
    }

    /// Position in the execution order.
    pub fn order(&self) -> usize {
        *self as usize
    }

    /// Run this stage against a frozen atom set.
    pub fn derive(&self, ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Vec<Atom> {
        match self {
            StageId::WorldFacts => world_facts::derive(ctx, atoms),
            StageId::Axes => axes::derive(ctx, atoms),
            StageId::Lens => lens::derive(ctx, atoms),
            StageId::Tom => tom::derive(ctx, atoms),
            StageId::Threat => threat::derive(ctx, atoms),
            StageId::Emotion => emotion::derive(ctx, atoms),
            StageId::Goals => goals::derive(ctx, atoms),
            StageId::Possibilities => possibilities::derive(ctx, atoms),
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything one agent-tick reads, plus the session it may update.
pub struct TickContext<'a> {
    pub self_id: &'a AgentId,
    pub tick: u64,
    pub world: Option<&'a WorldSnapshot>,
    pub scene: Option<SceneControls>,
    pub manual_atoms: &'a [Atom],
    pub config: &'a EngineConfig,
    pub session: &'a mut SimulationSession,
}

impl<'a> TickContext<'a> {
    /// The subject segment used in atom ids.
    pub fn subject(&self) -> &str {
        self.self_id.as_str()
    }
}

/// Inputs of one agent-tick. Every piece is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInput {
    pub self_id: AgentId,

    /// Used when no world is supplied.
    #[serde(default)]
    pub tick: u64,

    #[serde(default)]
    pub world: Option<WorldSnapshot>,

    /// Manual atoms merged into world facts by precedence. Atoms with
    /// override origin are pinned for the whole tick.
    #[serde(default)]
    pub manual_atoms: Vec<Atom>,

    /// Takes priority over the world's scene controls.
    #[serde(default)]
    pub scene: Option<SceneControls>,
}

impl PipelineInput {
    pub fn new(self_id: impl Into<AgentId>) -> Self {
        Self {
            self_id: self_id.into(),
            tick: 0,
            world: None,
            manual_atoms: Vec::new(),
            scene: None,
        }
    }

    pub fn with_world(mut self, world: WorldSnapshot) -> Self {
        self.world = Some(world);
        self
    }

    pub fn with_atom(mut self, atom: Atom) -> Self {
        self.manual_atoms.push(atom);
        self
    }

    pub fn with_scene(mut self, scene: SceneControls) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }
}

/// What one stage changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiff {
    pub stage: StageId,
    pub added: Vec<String>,
    pub overridden: Vec<String>,
    /// Atom count after the stage barrier.
    pub atom_count: usize,
    pub fixes: Vec<String>,
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub agent: AgentId,
    pub tick: u64,
    pub atoms: AtomSet,
    pub diffs: Vec<StageDiff>,
    pub validation: ValidationReport,
    pub decision: Option<Decision>,
}

impl PipelineResult {
    pub fn value(&self, key: &AtomKey) -> Option<f64> {
        self.atoms.value(key)
    }

    pub fn diff(&self, stage: StageId) -> Option<&StageDiff> {
        self.diffs.iter().find(|d| d.stage == stage)
    }
}

/// Normalize stage output and tag it with its stage.
pub(crate) fn finish_stage_atoms(stage: StageId, atoms: Vec<Atom>) -> Vec<Atom> {
    atoms
        .into_iter()
        .map(|a| {
            let a = a.normalize();
            if a.source.is_some() {
                a
            } else {
                a.with_source(stage.as_str())
            }
        })
        .collect()
}

/// Run every stage for one agent.
pub fn run_pipeline(
    input: &PipelineInput,
    session: &mut SimulationSession,
    config: &EngineConfig,
) -> MindResult<PipelineResult> {
    config.validate()?;

    let tick = input.world.as_ref().map(|w| w.tick).unwrap_or(input.tick);
    let scene = input
        .scene
        .or_else(|| input.world.as_ref().and_then(|w| w.scene));
    if let Some(world) = &input.world {
        if world.get_agent(&input.self_id).is_none() {
            warn!(agent = %input.self_id, "agent missing from world snapshot, using neutral defaults");
        }
    }

    let overrides: Vec<Atom> = input
        .manual_atoms
        .iter()
        .filter(|a| a.origin == Origin::Override)
        .cloned()
        .map(Atom::normalize)
        .collect();

    let mut ctx = TickContext {
        self_id: &input.self_id,
        tick,
        world: input.world.as_ref(),
        scene,
        manual_atoms: &input.manual_atoms,
        config,
        session,
    };

    let mut atoms = AtomSet::new();
    let mut diffs = Vec::with_capacity(StageId::ALL.len());

    for stage in StageId::ALL {
        let emitted = finish_stage_atoms(stage, stage.derive(&mut ctx, &atoms));
        let (emitted, fixes) = if config.pipeline.auto_fix {
            auto_fix(emitted)
        } else {
            (emitted, Vec::new())
        };
        let report = validate_atoms(&emitted);

        let merged = merge_newer_wins(&atoms, &emitted);
        let pinned = pin_overrides(&merged.atoms, &overrides);
        atoms = pinned.atoms;

        debug!(
            agent = %input.self_id,
            tick,
            stage = %stage,
            added = merged.added.len(),
            overridden = merged.overridden.len(),
            issues = report.issues.len(),
            "stage complete"
        );
        for issue in report.errors() {
            warn!(
                stage = %stage,
                atom = issue.atom_id.as_deref().unwrap_or("-"),
                message = %issue.message,
                "invalid atom"
            );
        }

        diffs.push(StageDiff {
            stage,
            added: merged.added,
            overridden: merged.overridden,
            atom_count: atoms.len(),
            fixes,
            issues: report.issues,
        });
    }

    let validation = validate_set(&atoms);
    let decision = Decision::from_atoms(&atoms, &input.self_id, tick);

    Ok(PipelineResult {
        agent: input.self_id.clone(),
        tick,
        atoms,
        diffs,
        validation,
        decision,
    })
}

/// `ns:<metric>:<subject>:`, the scan prefix of a relational family.
pub(crate) fn relational_prefix(namespace: &str, metric: &str, subject: &str) -> String {
    format!("{}:{}:{}:", namespace, metric, subject)
}

/// Value of a non-derived atom that a stage must not recompute.
pub(crate) fn pinned_value(atoms: &AtomSet, key: &AtomKey) -> Option<f64> {
    atoms
        .get_key(key)
        .filter(|a| a.origin != Origin::Derived)
        .map(|a| a.magnitude)
}

/// Reads stage inputs and records every atom that was actually found, so the
/// emitted atom's trace lists exactly what it used.
pub(crate) struct Reader<'a> {
    atoms: &'a AtomSet,
    used: Vec<String>,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(atoms: &'a AtomSet) -> Self {
        Self {
            atoms,
            used: Vec::new(),
        }
    }

    fn record(&mut self, id: String) {
        if !self.used.contains(&id) {
            self.used.push(id);
        }
    }

    /// Magnitude of `key`, if present.
    pub(crate) fn get(&mut self, key: &AtomKey) -> Option<f64> {
        let atom = self.atoms.get_key(key)?;
        let value = atom.magnitude;
        self.record(atom.id_str());
        Some(value)
    }

    pub(crate) fn value_or(&mut self, key: &AtomKey, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    /// First present key in order.
    pub(crate) fn first(&mut self, keys: &[AtomKey]) -> Option<f64> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// An axis as perceived: lens axis, else context axis.
    pub(crate) fn axis(&mut self, axis: &str, subject: &str) -> Option<f64> {
        self.first(&[AtomKey::lens(axis, subject), AtomKey::ctx(axis, subject)])
    }

    /// Largest magnitude under `prefix`, recording every atom scanned.
    pub(crate) fn max_with_prefix(&mut self, prefix: &str) -> Option<f64> {
        let atoms = self.atoms;
        let mut best: Option<f64> = None;
        for atom in atoms.with_prefix(prefix) {
            self.record(atom.id_str());
            best = Some(best.map_or(atom.magnitude, |b| b.max(atom.magnitude)));
        }
        best
    }

    /// Targets under `prefix`, without recording them as used.
    pub(crate) fn targets(&self, prefix: &str) -> BTreeSet<String> {
        self.atoms.targets_with_prefix(prefix)
    }

    /// Record an id computed elsewhere.
    pub(crate) fn note_used(&mut self, id: &str) {
        self.record(id.to_string());
    }

    pub(crate) fn has_inputs(&self) -> bool {
        !self.used.is_empty()
    }

    pub(crate) fn take_used(&mut self) -> Vec<String> {
        std::mem::take(&mut self.used)
    }

    /// A derived atom over everything read since the last take, or `None`
    /// when nothing was read and the value is a pure default.
    pub(crate) fn emit(&mut self, key: AtomKey, magnitude: f64) -> Option<Atom> {
        let id = key.to_string();
        let mut used = self.take_used();
        used.retain(|u| *u != id);
        if used.is_empty() {
            return None;
        }
        Some(Atom::derived(key, magnitude, used))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::IssueCode;
    use crate::tom::TomAction;
    use sim_world::{
        Agent, BodyState, EventKind, MapCell, Position, Relationship, Traits, WorldEvent, WorldMap,
    };

    fn manual(id: AtomKey, value: f64) -> Atom {
        Atom::new(id, Origin::Obs, value)
    }

    fn run(input: &PipelineInput) -> PipelineResult {
        let mut session = SimulationSession::new();
        run_pipeline(input, &mut session, &EngineConfig::default()).unwrap()
    }

    fn tom_mode(danger: f64, uncertainty: f64) -> f64 {
        let input = PipelineInput::new("A")
            .with_atom(manual(AtomKey::ctx("danger", "A"), danger))
            .with_atom(manual(AtomKey::ctx("uncertainty", "A"), uncertainty));
        run(&input).value(&AtomKey::tom_mode("A")).unwrap()
    }

    fn village() -> WorldSnapshot {
        let mut world = WorldSnapshot::new();
        world.tick = 10;
        let a = world.add_agent(
            Agent::new("A", "Ada")
                .with_traits(Traits {
                    paranoia: 0.7,
                    ..Default::default()
                })
                .with_body(BodyState {
                    health: 0.8,
                    ..Default::default()
                }),
        );
        let b = world.add_agent(Agent::new("B", "Bo"));
        let c = world.add_agent(Agent::new("C", "Cy"));

        let mut map = WorldMap::new(10, 10);
        map.set_cell(
            Position::new(1, 1),
            MapCell {
                hazard: 0.3,
                ..Default::default()
            },
        )
        .unwrap();
        world.map = Some(map);
        world.set_position(&a, Position::new(1, 1)).unwrap();
        world.set_position(&b, Position::new(2, 1)).unwrap();
        world.set_position(&c, Position::new(1, 3)).unwrap();

        world.set_relationship(Relationship::new(a.clone(), b.clone()).with_trust(0.1).with_hostility(0.7));
        world.set_relationship(Relationship::new(a.clone(), c.clone()).with_trust(0.9).with_closeness(0.8));
        world.events.push(
            WorldEvent::new(9, EventKind::Threaten, b.clone())
                .with_target(a.clone())
                .with_intensity(0.8),
        );
        world.events.push(WorldEvent::new(8, EventKind::Help, c).with_target(a).with_intensity(0.7));
        world
    }

    #[test]
    fn test_high_time_pressure_is_fast_thinking() {
        // voi = 0.6 x (0.3 + 0.7 x 0.8) = 0.516 < time pressure 0.8
        let s2 = tom_mode(0.8, 0.6);
        assert!(s2 < 0.5, "s2 = {}", s2);
    }

    #[test]
    fn test_calm_uncertainty_is_deliberate() {
        let s2 = tom_mode(0.1, 0.9);
        assert!(s2 > 0.5, "s2 = {}", s2);
        assert!(s2 > tom_mode(0.8, 0.6));
    }

    #[test]
    fn test_derived_atoms_are_traced() {
        let result = run(&PipelineInput::new("A").with_world(village()));
        for atom in result.atoms.iter().filter(|a| a.origin == Origin::Derived) {
            let used = atom.used_ids();
            assert!(!used.is_empty(), "{} has no inputs", atom.id);
            assert!(!used.contains(&atom.id_str()), "{} uses itself", atom.id);
        }
        assert!(!result.validation.has_code(IssueCode::Cycle));
        assert!(!result.validation.has_code(IssueCode::MissingTrace));
        assert!(!result.validation.has_code(IssueCode::SelfReference));
    }

    #[test]
    fn test_every_stage_logged() {
        let result = run(&PipelineInput::new("A").with_world(village()));
        assert_eq!(result.diffs.len(), StageId::ALL.len());
        for stage in StageId::ALL {
            let diff = result.diff(stage).unwrap();
            assert!(!diff.added.is_empty() || !diff.overridden.is_empty(), "{} emitted nothing", stage);
        }
        assert_eq!(result.tick, 10);
    }

    #[test]
    fn test_world_scenario_outputs() {
        let result = run(&PipelineInput::new("A").with_world(village()));
        let harm_b = result.value(&AtomKey::tom_belief("A", "B", "harmfulness")).unwrap();
        let harm_c = result.value(&AtomKey::tom_belief("A", "C", "harmfulness")).unwrap();
        assert!(harm_b > harm_c);

        let social = result.value(&AtomKey::threat("social", "A")).unwrap();
        assert!(social > 0.3);
        assert!(result.value(&AtomKey::emo("fear", "A")).unwrap() > 0.0);

        let decision = result.decision.as_ref().unwrap();
        assert_eq!(decision.agent, AgentId::new("A"));
        assert!(!decision.candidates.is_empty());
        for pair in decision.candidates.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(
            result.value(&AtomKey::decision("best", "A")),
            Some(decision.chosen.score)
        );
    }

    #[test]
    fn test_friend_and_foe_policies_differ() {
        let result = run(&PipelineInput::new("A").with_world(village()));
        let assist = |other: &str| {
            result
                .value(&AtomKey::tom_policy("A", other, TomAction::Assist.as_str()))
                .unwrap()
        };
        assert!(assist("C") > assist("B"));
    }

    #[test]
    fn test_override_survives_derivation() {
        let input = PipelineInput::new("A")
            .with_world(village())
            .with_atom(Atom::new(AtomKey::ctx("danger", "A"), Origin::Override, 0.05));
        let result = run(&input);
        assert_eq!(result.value(&AtomKey::ctx("danger", "A")), Some(0.05));
        assert_eq!(
            result.atoms.get_key(&AtomKey::ctx("danger", "A")).unwrap().origin,
            Origin::Override
        );
    }

    #[test]
    fn test_empty_input_tolerated() {
        let result = run(&PipelineInput::new("A"));
        assert!(result.atoms.is_empty());
        assert!(result.decision.is_none());
        assert!(result.validation.ok());
    }

    #[test]
    fn test_unknown_agent_uses_defaults() {
        let result = run(&PipelineInput::new("Z").with_world(village()));
        assert!(result.validation.ok());
        assert!(result.value(&AtomKey::world("health", "Z")).is_none());
    }

    #[test]
    fn test_goal_state_persists_in_session() {
        let mut session = SimulationSession::new();
        let config = EngineConfig::default();
        let input = PipelineInput::new("A").with_world(village());
        let first = run_pipeline(&input, &mut session, &config).unwrap();
        let active: Vec<_> = first
            .atoms
            .with_prefix("goal:active:")
            .map(|a| a.id_str())
            .collect();
        assert!(!active.is_empty());
        assert!(!session.previously_active(&AgentId::new("A")).is_empty());
    }
}
