//! Theory-of-mind policy layer.
//!
//! For a (self, other) pair:
//! 1. **System-2 intensity**: `sigmoid(k x (uncertainty x stakes - time_pressure))`,
//!    an approximate value-of-information test for deliberate reasoning
//! 2. **Beliefs**: latent traits of the other updated in log-odds space,
//!    `posterior_logit = prior_logit + precision x evidence`
//! 3. **Policy**: expected utility per candidate action, softmaxed with a
//!    temperature that falls as System-2 intensity rises
//!
//! Every intermediate quantity is returned so the pipeline can put it in the
//! emitted atoms' traces.

mod belief;
mod policy;

pub use belief::*;
pub use policy::*;

use serde::{Deserialize, Serialize};

use crate::error::{MindError, MindResult};
use crate::math::{clamp01, sigmoid};

/// Configuration for the ToM layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomConfig {
    /// Gain `k` of the System-2 sigmoid.
    pub s2_gain: f64,

    /// Belief precision at System-2 intensity 0 and 1.
    pub precision_min: f64,
    pub precision_max: f64,

    /// Policy temperature at System-2 intensity 0 and 1.
    pub temperature_max: f64,
    pub temperature_min: f64,

    /// Priors used when no stored belief exists.
    pub prior_helpfulness: f64,
    pub prior_harmfulness: f64,
    pub prior_truthfulness: f64,

    /// Dyad metrics that must be present before a pair is assessed.
    pub min_dyad_metrics: usize,
}

impl Default for TomConfig {
    fn default() -> Self {
        Self {
            s2_gain: 6.0,
            precision_min: 0.5,
            precision_max: 2.0,
            temperature_max: 1.0,
            temperature_min: 0.15,
            prior_helpfulness: 0.5,
            prior_harmfulness: 0.2,
            prior_truthfulness: 0.6,
            min_dyad_metrics: 2,
        }
    }
}

impl TomConfig {
    pub fn validate(&self) -> MindResult<()> {
        if !(self.s2_gain.is_finite() && self.s2_gain > 0.0) {
            return Err(MindError::Config(format!("tom.s2_gain {} must be positive", self.s2_gain)));
        }
        if !(self.precision_min >= 0.0
            && self.precision_max >= self.precision_min
            && self.precision_max.is_finite())
        {
            return Err(MindError::Config(
                "tom precision bounds must satisfy 0 <= min <= max".to_string(),
            ));
        }
        if !(self.temperature_min > 0.0
            && self.temperature_max >= self.temperature_min
            && self.temperature_max.is_finite())
        {
            return Err(MindError::Config(
                "tom temperature bounds must satisfy 0 < min <= max".to_string(),
            ));
        }
        if self.min_dyad_metrics < 1 {
            return Err(MindError::Config("tom.min_dyad_metrics must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Precision of belief updates at a given System-2 intensity.
    pub fn precision(&self, s2: f64) -> f64 {
        self.precision_min + (self.precision_max - self.precision_min) * clamp01(s2)
    }

    /// Softmax temperature at a given System-2 intensity.
    pub fn temperature(&self, s2: f64) -> f64 {
        self.temperature_max - (self.temperature_max - self.temperature_min) * clamp01(s2)
    }
}

/// Inputs of the System-2 test, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct System2Inputs {
    pub uncertainty: f64,
    pub stakes: f64,
    pub time_pressure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct System2Estimate {
    pub inputs: System2Inputs,
    /// `uncertainty x stakes`
    pub voi: f64,
    pub gain: f64,
    pub intensity: f64,
}

impl System2Estimate {
    /// Above 0.5 the agent is deliberating.
    pub fn is_deliberate(&self) -> bool {
        self.intensity > 0.5
    }

    pub fn label(&self) -> &'static str {
        if self.is_deliberate() {
            "System-2"
        } else {
            "System-1"
        }
    }
}

pub fn system2_intensity(inputs: System2Inputs, gain: f64) -> System2Estimate {
    let voi = clamp01(inputs.uncertainty) * clamp01(inputs.stakes);
    let intensity = sigmoid(gain * (voi - clamp01(inputs.time_pressure)));
    System2Estimate {
        inputs,
        voi,
        gain,
        intensity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(TomConfig::default().validate().is_ok());

        let config = TomConfig {
            min_dyad_metrics: 0,
            ..TomConfig::default()
        };
        assert!(matches!(config.validate(), Err(MindError::Config(_))));

        let config = TomConfig {
            precision_max: f64::NAN,
            ..TomConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TomConfig {
            temperature_min: f64::NAN,
            ..TomConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_high_pressure_is_system_one() {
        let estimate = system2_intensity(
            System2Inputs {
                uncertainty: 0.6,
                stakes: 0.86,
                time_pressure: 0.8,
            },
            6.0,
        );
        assert!(estimate.voi < 0.8);
        assert!(!estimate.is_deliberate());
        assert_eq!(estimate.label(), "System-1");
    }

    #[test]
    fn test_uncertain_calm_is_system_two() {
        let estimate = system2_intensity(
            System2Inputs {
                uncertainty: 0.9,
                stakes: 0.37,
                time_pressure: 0.1,
            },
            6.0,
        );
        assert!(estimate.is_deliberate());
    }

    #[test]
    fn test_precision_and_temperature_move_opposite() {
        let config = TomConfig::default();
        assert!(config.precision(1.0) > config.precision(0.0));
        assert!(config.temperature(1.0) < config.temperature(0.0));
        assert!((config.temperature(1.0) - config.temperature_min).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }
}
