//! Move Configuration
//!
//! Settings for a Metropolis-Hastings move, loadable from JSON. Every field
//! has a default, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "weight": 2.0,
//!   "auto_tune": true,
//!   "tune_target": 0.44,
//!   "heats": { "likelihood": 0.5 }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::proposal::DEFAULT_TUNE_TARGET;

/// Exponents applied to the components of the posterior ratio.
///
/// All ones is a standard chain. A likelihood heat of zero samples the
/// prior; a posterior heat below one flattens the surface for heated chains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heats {
    pub prior: f64,
    pub likelihood: f64,
    pub posterior: f64,
}

impl Default for Heats {
    fn default() -> Self {
        Self {
            prior: 1.0,
            likelihood: 1.0,
            posterior: 1.0,
        }
    }
}

impl Heats {
    /// Heated log posterior ratio from its prior and likelihood parts.
    pub fn ln_posterior_ratio(&self, ln_prior_ratio: f64, ln_likelihood_ratio: f64) -> f64 {
        self.posterior * (self.likelihood * ln_likelihood_ratio + self.prior * ln_prior_ratio)
    }
}

/// Configuration of one Metropolis-Hastings move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveConfig {
    /// Relative frequency with which a schedule picks this move.
    pub weight: f64,
    /// Whether [`auto_tune`](crate::moves::MetropolisHastingsMove::auto_tune)
    /// adjusts the proposal.
    pub auto_tune: bool,
    /// Acceptance rate that tuning steers towards.
    pub tune_target: f64,
    pub heats: Heats,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            weight: 1.0,
            auto_tune: true,
            tune_target: DEFAULT_TUNE_TARGET,
            heats: Heats::default(),
        }
    }
}

impl MoveConfig {
    /// Parse and validate a configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "weight must be positive, got {}",
                self.weight
            )));
        }
        if !(self.tune_target > 0.0 && self.tune_target < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "tune_target must lie in (0, 1), got {}",
                self.tune_target
            )));
        }
        let heats = [
            ("prior", self.heats.prior),
            ("likelihood", self.heats.likelihood),
            ("posterior", self.heats.posterior),
        ];
        for (name, heat) in heats {
            if !(heat.is_finite() && heat >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} heat must be finite and non-negative, got {heat}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = MoveConfig::from_json("{}").unwrap();
        assert_eq!(config, MoveConfig::default());
        assert_eq!(config.tune_target, 0.44);
    }

    #[test]
    fn partial_heats_keep_defaults() {
        let config = MoveConfig::from_json(r#"{ "weight": 2.0, "heats": { "likelihood": 0.5 } }"#).unwrap();
        assert_eq!(config.weight, 2.0);
        assert_eq!(config.heats.likelihood, 0.5);
        assert_eq!(config.heats.prior, 1.0);
        assert_eq!(config.heats.ln_posterior_ratio(1.0, 2.0), 2.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = MoveConfig::from_json(r#"{ "heats": { "posterior": -1.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = MoveConfig::from_json(r#"{ "tune_target": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = MoveConfig::from_json("{ weight: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn round_trips_through_json() {
        let config = MoveConfig {
            weight: 3.0,
            ..MoveConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(MoveConfig::from_json(&json).unwrap(), config);
    }
}
