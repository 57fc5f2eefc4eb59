//! Engine configuration.
//!
//! Every section defaults to working values, so a TOML file only needs the
//! keys it changes:
//!
//! ```toml
//! [energy]
//! steps = 6
//!
//! [goals]
//! max_active = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MindError, MindResult};
use crate::goals::GoalConfig;
use crate::graph::EnergyConfig;
use crate::tom::TomConfig;

/// Stage pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Repair atoms with `auto_fix` before validation at each stage barrier.
    pub auto_fix: bool,

    /// Agents within this distance count as nearby.
    pub nearby_radius: f64,

    /// Events older than this many ticks are forgotten.
    pub memory_window: u64,

    /// Age in ticks at which an event's weight halves.
    pub memory_half_life: f64,

    /// How strongly traits bend context axes into lens axes.
    pub lens_gain: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_fix: true,
            nearby_radius: 6.0,
            memory_window: 50,
            memory_half_life: 10.0,
            lens_gain: 0.5,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> MindResult<()> {
        if !(self.nearby_radius.is_finite() && self.nearby_radius >= 0.0) {
            return Err(MindError::Config(format!(
                "pipeline.nearby_radius {} must be a non-negative number",
                self.nearby_radius
            )));
        }
        if !(self.memory_half_life.is_finite() && self.memory_half_life > 0.0) {
            return Err(MindError::Config("pipeline.memory_half_life must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.lens_gain) {
            return Err(MindError::Config(format!("pipeline.lens_gain {} outside [0, 1]", self.lens_gain)));
        }
        Ok(())
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Atom changes listed in the trace summary.
    pub summary_top_n: usize,

    /// Restore the working set when a producer fails instead of aborting.
    pub isolate_failures: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            summary_top_n: 10,
            isolate_failures: true,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pipeline: PipelineConfig,
    pub energy: EnergyConfig,
    pub tom: TomConfig,
    pub goals: GoalConfig,
    pub orchestrator: OrchestratorConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> MindResult<()> {
        self.pipeline.validate()?;
        self.energy.validate()?;
        self.tom.validate()?;
        self.goals.validate()?;
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> MindResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> MindResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
