//! Producer orchestration.
//!
//! Producers run in registry order against a working atom set. Each returns a
//! [`Patch`] that is applied before the next producer runs, so one tick is a
//! fold of patches over the set. A producer that errors or panics is isolated:
//! its patch is discarded, the working set and session are left as they were
//! before it ran, and the failure is recorded in the trace.

mod patch;
mod producer;
mod trace;

pub use patch::*;
pub use producer::*;
pub use trace::*;

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, info};

use crate::atoms::{validate_set, AtomSet, ValidationReport};
use crate::config::EngineConfig;
use crate::decision::Decision;
use crate::error::{MindError, MindResult, ProducerError};
use crate::pipeline::{PipelineInput, TickContext};
use crate::session::SimulationSession;

/// Result of one orchestrated agent-tick.
#[derive(Debug, Clone)]
pub struct OrchestratorRun {
    pub atoms: AtomSet,
    pub trace: OrchestratorTraceV1,
    pub validation: ValidationReport,
    pub decision: Option<Decision>,
}

/// Registry of producers, kept in run order.
#[derive(Default)]
pub struct Orchestrator {
    producers: Vec<Box<dyn Producer>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An orchestrator running every pipeline stage.
    pub fn with_pipeline() -> Self {
        let mut orchestrator = Self::new();
        for producer in pipeline_producers() {
            orchestrator.register(producer);
        }
        orchestrator
    }

    pub fn register(&mut self, producer: Box<dyn Producer>) {
        self.producers.push(producer);
        self.producers.sort_by(|a, b| a.spec().run_order(&b.spec()));
    }

    pub fn specs(&self) -> Vec<ProducerSpec> {
        self.producers.iter().map(|p| p.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    /// Run every producer once for one agent.
    pub fn run_tick(
        &self,
        input: &PipelineInput,
        session: &mut SimulationSession,
        config: &EngineConfig,
    ) -> MindResult<OrchestratorRun> {
        config.validate()?;

        let tick = input.world.as_ref().map(|w| w.tick).unwrap_or(input.tick);
        let scene = input
            .scene
            .or_else(|| input.world.as_ref().and_then(|w| w.scene));
        let mut trace = OrchestratorTraceV1::new(input.self_id.clone(), tick);
        let mut atoms = AtomSet::new();

        for producer in &self.producers {
            let spec = producer.spec();
            let snapshot = session.clone();
            let result = {
                let mut ctx = TickContext {
                    self_id: &input.self_id,
                    tick,
                    world: input.world.as_ref(),
                    scene,
                    manual_atoms: &input.manual_atoms,
                    config,
                    session: &mut *session,
                };
                catch_unwind(AssertUnwindSafe(|| producer.produce(&mut ctx, &atoms)))
                    .unwrap_or_else(|payload| {
                        Err(ProducerError::Panicked {
                            name: spec.name.clone(),
                            message: panic_message(payload.as_ref()),
                        })
                    })
            };

            let entry = match result {
                Ok(patch) => {
                    let outcome = patch.apply(&atoms);
                    record_changes(&mut trace, &spec, &atoms, &outcome);
                    let entry = ProducerTrace {
                        name: spec.name.clone(),
                        priority: spec.priority,
                        input_refs: input_refs(&patch, &atoms),
                        outputs: ProducerOutputs {
                            atoms_added: outcome.added.clone(),
                            atoms_updated: outcome.updated.clone(),
                            atoms_removed: outcome.removed.clone(),
                        },
                        why: patch.why.clone(),
                        error: None,
                    };
                    debug!(
                        producer = %spec.name,
                        stage = %spec.stage_id,
                        added = outcome.added.len(),
                        updated = outcome.updated.len(),
                        removed = outcome.removed.len(),
                        rejected = outcome.rejected.len(),
                        "patch applied"
                    );
                    atoms = outcome.atoms;
                    entry
                }
                Err(err) => {
                    *session = snapshot;
                    if !config.orchestrator.isolate_failures {
                        return Err(MindError::ProducerAborted {
                            name: spec.name.clone(),
                            reason: err.to_string(),
                        });
                    }
                    error!(producer = %spec.name, stage = %spec.stage_id, error = %err, "producer failed, patch discarded");
                    trace.log.push(format!("{}: {}", spec.name, err));
                    ProducerTrace {
                        name: spec.name.clone(),
                        priority: spec.priority,
                        input_refs: Vec::new(),
                        outputs: ProducerOutputs::default(),
                        why: Vec::new(),
                        error: Some(err.to_string()),
                    }
                }
            };
            trace.stage_mut(spec.stage_id).producers.push(entry);
        }

        trace.finish(config.orchestrator.summary_top_n);
        let failures = trace.errors().count();
        info!(
            agent = %input.self_id,
            tick,
            producers = self.producers.len(),
            failures,
            atoms = atoms.len(),
            "orchestrator tick complete"
        );

        let validation = validate_set(&atoms);
        let decision = Decision::from_atoms(&atoms, &input.self_id, tick);
        Ok(OrchestratorRun {
            atoms,
            trace,
            validation,
            decision,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Ids in the working set that the patch's atoms were derived from.
fn input_refs(patch: &Patch, atoms: &AtomSet) -> Vec<String> {
    let refs: BTreeSet<String> = patch
        .add
        .iter()
        .chain(patch.update.iter())
        .flat_map(|a| a.used_ids().iter())
        .filter(|id| atoms.contains(id))
        .cloned()
        .collect();
    refs.into_iter().collect()
}

fn record_changes(trace: &mut OrchestratorTraceV1, spec: &ProducerSpec, before: &AtomSet, outcome: &PatchOutcome) {
    let lists = [
        (ChangeKind::Added, &outcome.added),
        (ChangeKind::Updated, &outcome.updated),
        (ChangeKind::Removed, &outcome.removed),
    ];
    for (kind, ids) in lists {
        for id in ids {
            trace.atom_changes.push(AtomChange {
                atom_id: id.clone(),
                kind,
                stage_id: spec.stage_id,
                producer: spec.name.clone(),
                before: before.get(id).map(|a| a.magnitude),
                after: outcome.atoms.get(id).map(|a| a.magnitude),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{Atom, AtomKey, Origin};
    use crate::goals::{GoalDomain, GoalState};
    use crate::pipeline::{run_pipeline, StageId};

    struct Fixed {
        spec: ProducerSpec,
        patch: Patch,
    }

    impl Producer for Fixed {
        fn spec(&self) -> ProducerSpec {
            self.spec.clone()
        }

        fn produce(&self, _ctx: &mut TickContext<'_>, _atoms: &AtomSet) -> Result<Patch, ProducerError> {
            Ok(self.patch.clone())
        }
    }

    /// Dirties the session, then fails or panics.
    struct Faulty {
        name: &'static str,
        panics: bool,
    }

    impl Producer for Faulty {
        fn spec(&self) -> ProducerSpec {
            ProducerSpec::new(StageId::Axes, 0, self.name)
        }

        fn produce(&self, ctx: &mut TickContext<'_>, _atoms: &AtomSet) -> Result<Patch, ProducerError> {
            ctx.session.set_goal_state(
                ctx.self_id,
                GoalDomain::Rest,
                GoalState {
                    tension: 0.9,
                    ..Default::default()
                },
            );
            if self.panics {
                panic!("boom");
            }
            Err(ProducerError::failed(self.name, "no data"))
        }
    }

    fn x(origin: Origin, magnitude: f64) -> Atom {
        Atom::new(AtomKey::custom("x", &["value"]), origin, magnitude)
    }

    fn fixed(name: &str, priority: i32, atom: Atom) -> Box<dyn Producer> {
        Box::new(Fixed {
            spec: ProducerSpec::new(StageId::WorldFacts, priority, name),
            patch: Patch::new().with_add(atom).with_why(format!("rule:{}", name)),
        })
    }

    fn run(orchestrator: &Orchestrator) -> OrchestratorRun {
        let mut session = SimulationSession::new();
        orchestrator
            .run_tick(&PipelineInput::new("A"), &mut session, &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_observation_beats_world_fact() {
        for (obs_priority, world_priority) in [(1, 0), (0, 1)] {
            let mut orchestrator = Orchestrator::new();
            orchestrator.register(fixed("obs", obs_priority, x(Origin::Obs, 0.4)));
            orchestrator.register(fixed("world", world_priority, x(Origin::World, 0.9)));
            let result = run(&orchestrator);
            assert_eq!(result.atoms.get("x:value").unwrap().magnitude, 0.4);
            assert_eq!(result.atoms.get("x:value").unwrap().origin, Origin::Obs);
        }
    }

    #[test]
    fn test_trace_records_producers() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(fixed("obs", 0, x(Origin::Obs, 0.4)));
        let result = run(&orchestrator);
        let trace = &result.trace;
        assert_eq!(trace.version, TRACE_VERSION);
        let producer = trace.producer("obs").unwrap();
        assert_eq!(producer.outputs.atoms_added, vec!["x:value"]);
        assert_eq!(producer.why, vec!["rule:obs"]);
        assert_eq!(trace.atom_changes.len(), 1);
        assert_eq!(trace.atom_changes[0].kind, ChangeKind::Added);
        assert_eq!(trace.summary.len(), 1);
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(fixed("first", 0, x(Origin::Obs, 0.4)));
        orchestrator.register(Box::new(Faulty {
            name: "erring",
            panics: false,
        }));
        orchestrator.register(Box::new(Faulty {
            name: "panicking",
            panics: true,
        }));

        let mut session = SimulationSession::new();
        let result = orchestrator
            .run_tick(&PipelineInput::new("A"), &mut session, &EngineConfig::default())
            .unwrap();
        assert_eq!(result.atoms.get("x:value").unwrap().magnitude, 0.4);
        assert_eq!(result.trace.errors().count(), 2);
        assert!(result.trace.producer("panicking").unwrap().error.as_deref().unwrap().contains("boom"));
        assert_eq!(result.trace.log.len(), 2);
        assert_eq!(session, SimulationSession::new());
    }

    #[test]
    fn test_failure_aborts_when_not_isolated() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(Box::new(Faulty {
            name: "erring",
            panics: false,
        }));
        let mut config = EngineConfig::default();
        config.orchestrator.isolate_failures = false;
        let mut session = SimulationSession::new();
        let err = orchestrator
            .run_tick(&PipelineInput::new("A"), &mut session, &config)
            .unwrap_err();
        assert!(matches!(err, MindError::ProducerAborted { .. }));
        assert_eq!(session, SimulationSession::new());
    }

    #[test]
    fn test_registry_order() {
        let mut orchestrator = Orchestrator::with_pipeline();
        orchestrator.register(Box::new(Faulty {
            name: "extra",
            panics: false,
        }));
        let names: Vec<String> = orchestrator.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names[0], "world_facts");
        assert_eq!(names[1], "axes");
        assert_eq!(names[2], "extra");
        assert_eq!(orchestrator.len(), StageId::ALL.len() + 1);
    }

    #[test]
    fn test_pipeline_producers_match_pipeline() {
        let input = PipelineInput::new("A")
            .with_atom(Atom::new(AtomKey::world("hazard", "A"), Origin::World, 0.6))
            .with_atom(Atom::new(AtomKey::obs("hostile", "A", Some("B")), Origin::Obs, 0.7))
            .with_atom(Atom::new(AtomKey::rel("trust", "A", "B"), Origin::World, 0.2))
            .with_atom(Atom::new(AtomKey::ctx("uncertainty", "A"), Origin::Override, 0.7));
        let config = EngineConfig::default();

        let mut session = SimulationSession::new();
        let staged = run_pipeline(&input, &mut session, &config).unwrap();
        let mut session = SimulationSession::new();
        let orchestrated = Orchestrator::with_pipeline().run_tick(&input, &mut session, &config).unwrap();

        assert_eq!(staged.atoms.len(), orchestrated.atoms.len());
        for atom in staged.atoms.iter() {
            let other = orchestrated.atoms.get(&atom.id_str()).unwrap();
            assert!((atom.magnitude - other.magnitude).abs() < 1e-12, "{}", atom.id);
        }
        assert_eq!(
            orchestrated.atoms.value(&AtomKey::ctx("uncertainty", "A")),
            Some(0.7)
        );
        assert_eq!(
            staged.decision.map(|d| d.chosen.atom_id),
            orchestrated.decision.map(|d| d.chosen.atom_id)
        );
        assert!(orchestrated.trace.errors().next().is_none());
        assert_eq!(orchestrated.trace.stages.len(), StageId::ALL.len());
    }
}
