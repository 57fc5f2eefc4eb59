//! # Mind Core
//!
//! A layered inference engine for simulated agents. From a `sim_world`
//! snapshot it derives atoms (small traced facts) for context axes, the
//! agent's subjective lens, beliefs about other agents, threat, emotions,
//! goals and candidate actions. Every derived atom records the atoms it was
//! computed from.
//!
//! ## Core Components
//!
//! - **atoms**: Atom keys, origins, sets, merging and validation
//! - **graph**: Dependency graph, signal channels and energy propagation
//! - **pipeline**: The eight ordered derivation stages and their runner
//! - **tom**: System-2 intensity, log-odds belief updates and action policy
//! - **goals**: Mode gate, hysteresis selection and goal state integration
//! - **orchestrator**: Producer registry, patches and the versioned trace
//! - **simulation**: Tick driver that feeds decisions back into the world
//!
//! ## Design Philosophy
//!
//! - **Traced**: Every derived number can be walked back to world facts
//! - **Deterministic**: Ordered maps and explicit tie-breaks, no hidden state
//! - **Explicit State**: Cross-tick memory lives only in [`SimulationSession`]

pub mod atoms;
pub mod config;
pub mod decision;
pub mod error;
pub mod goals;
pub mod graph;
pub mod math;
pub mod orchestrator;
pub mod pipeline;
pub mod session;
pub mod simulation;
pub mod tom;

pub use atoms::*;
pub use config::*;
pub use decision::*;
pub use error::*;
pub use pipeline::{run_pipeline, PipelineInput, PipelineResult, StageDiff, StageId, TickContext};
pub use session::*;
pub use simulation::*;
