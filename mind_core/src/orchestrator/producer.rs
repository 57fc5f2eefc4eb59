//! Producers and their deterministic registry order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::Patch;
use crate::atoms::{auto_fix, AtomSet};
use crate::error::ProducerError;
use crate::pipeline::{finish_stage_atoms, StageId, TickContext};

/// Where a producer runs and how it is ordered within its stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerSpec {
    pub stage_id: StageId,
    /// Higher runs first within a stage.
    pub priority: i32,
    pub name: String,
}

impl ProducerSpec {
    pub fn new(stage_id: StageId, priority: i32, name: impl Into<String>) -> Self {
        Self {
            stage_id,
            priority,
            name: name.into(),
        }
    }

    /// Stage order, then priority descending, then name.
    pub fn run_order(&self, other: &Self) -> Ordering {
        self.stage_id
            .order()
            .cmp(&other.stage_id.order())
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// Reads the working set and proposes a patch.
pub trait Producer {
    fn spec(&self) -> ProducerSpec;

    fn produce(&self, ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Result<Patch, ProducerError>;
}

/// A pipeline stage run as a producer.
///
/// Atoms new to the working set are added, the rest are updated, so stage
/// output replaces earlier values the way the stage barrier does.
#[derive(Debug, Clone, Copy)]
pub struct StageProducer {
    stage: StageId,
}

impl StageProducer {
    pub fn new(stage: StageId) -> Self {
        Self { stage }
    }
}

impl Producer for StageProducer {
    fn spec(&self) -> ProducerSpec {
        ProducerSpec::new(self.stage, 0, self.stage.as_str())
    }

    fn produce(&self, ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Result<Patch, ProducerError> {
        let emitted = finish_stage_atoms(self.stage, self.stage.derive(ctx, atoms));
        let (emitted, fixes) = if ctx.config.pipeline.auto_fix {
            auto_fix(emitted)
        } else {
            (emitted, Vec::new())
        };

        let mut patch = Patch::new().with_why(format!("stage:{}", self.stage));
        for fix in fixes {
            patch = patch.with_why(format!("fix:{}", fix));
        }
        for atom in emitted {
            patch = if atoms.contains(&atom.id_str()) {
                patch.with_update(atom)
            } else {
                patch.with_add(atom)
            };
        }
        Ok(patch)
    }
}

/// One producer per pipeline stage, in stage order.
pub fn pipeline_producers() -> Vec<Box<dyn Producer>> {
    StageId::ALL
        .iter()
        .map(|stage| Box::new(StageProducer::new(*stage)) as Box<dyn Producer>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_order() {
        let mut specs = vec![
            ProducerSpec::new(StageId::Goals, 0, "goals"),
            ProducerSpec::new(StageId::Axes, 1, "b"),
            ProducerSpec::new(StageId::Axes, 5, "z"),
            ProducerSpec::new(StageId::Axes, 1, "a"),
            ProducerSpec::new(StageId::WorldFacts, -3, "facts"),
        ];
        specs.sort_by(|a, b| a.run_order(b));
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["facts", "z", "a", "b", "goals"]);
    }

    #[test]
    fn test_pipeline_producers_cover_stages() {
        let specs: Vec<StageId> = pipeline_producers().iter().map(|p| p.spec().stage_id).collect();
        assert_eq!(specs, StageId::ALL.to_vec());
    }
}
