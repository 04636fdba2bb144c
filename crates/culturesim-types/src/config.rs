//! Per-run configuration record.
//!
//! A [`Configuration`] fully determines one simulation run: grid and belief
//! dimensions, interaction parameters, collective-process schedules, the
//! iteration budget, and the RNG seed. Rows of an experiment definition are
//! expanded into one configuration per repetition by the core crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::grid::GridShape;

/// Largest supported trait count (keeps every trait representable as a
/// non-negative `i32` and vote buffers small).
pub const MAX_TRAITS: usize = 1 << 16;

/// Errors raised while validating or parsing configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The model-type tag is not one of the known interaction variants.
    #[error("unknown model type tag: {0:?}")]
    UnknownModel(String),

    /// A parameter is outside its valid range.
    #[error("invalid value for {field}: {reason}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Interaction rule variant selected by the experiment's model-type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Pure Axelrod homophily: dyadic copy with probability equal to overlap.
    Axelrod,
    /// Flache multilateral influence: similarity-weighted neighborhood vote.
    Flache,
    /// Homophily with institutional resistance, loyalty, and switching.
    Institutional,
}

impl ModelKind {
    /// Canonical tag written to checkpoint logs.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Axelrod => "axelrod",
            Self::Flache => "flache",
            Self::Institutional => "institutional",
        }
    }

    /// Whether the variant uses institutions at all.
    pub const fn uses_institutions(self) -> bool {
        matches!(self, Self::Institutional)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "axelrod" => Ok(Self::Axelrod),
            "f" | "flache" => Ok(Self::Flache),
            "i" | "institutional" => Ok(Self::Institutional),
            _ => Err(ConfigurationError::UnknownModel(s.trim().to_owned())),
        }
    }
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Interaction variant.
    pub model: ModelKind,
    /// Whether the seed came from OS entropy rather than the base seed.
    pub random_init: bool,
    /// Iteration budget. One iteration is `rows * cols` elementary ticks.
    pub iterations: u64,
    /// Iterations per checkpoint batch.
    pub checkpoint_period: u64,
    /// Checkpoint rows held in memory before the per-run log is flushed.
    pub write_buffer: usize,
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Radius of the diamond neighborhood.
    pub radius: usize,
    /// Belief-vector length.
    pub features: usize,
    /// Number of valid traits per feature.
    pub traits: usize,
    /// Per-tick probability of a random trait mutation.
    pub mutation: f64,
    /// Probability that the homophily decision is inverted.
    pub selection_error: f64,
    /// Institutional influence (resistance weight).
    pub alpha: f64,
    /// Institutional loyalty weight.
    pub alpha_prime: f64,
    /// Iterations between democracy rounds (0 disables).
    pub democracy_period: u64,
    /// Iterations between propaganda rounds (0 disables).
    pub propaganda_period: u64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            model: ModelKind::Institutional,
            random_init: false,
            iterations: 1_000,
            checkpoint_period: 100,
            write_buffer: 10,
            rows: 32,
            cols: 32,
            radius: 1,
            features: 5,
            traits: 10,
            mutation: 0.0,
            selection_error: 0.0,
            alpha: 0.5,
            alpha_prime: 0.5,
            democracy_period: 0,
            propaganda_period: 0,
            seed: 42,
        }
    }
}

impl Configuration {
    /// Grid dimensions.
    pub const fn shape(&self) -> GridShape {
        GridShape::new(self.rows, self.cols)
    }

    /// Elementary ticks in one iteration.
    pub const fn ticks_per_iteration(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Check every parameter against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutOfRange`] naming the first field
    /// that fails.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        positive("rows", self.rows)?;
        positive("cols", self.cols)?;
        positive("features", self.features)?;
        positive("radius", self.radius)?;
        positive("write_buffer", self.write_buffer)?;
        if self.traits < 2 || self.traits > MAX_TRAITS {
            return Err(ConfigurationError::OutOfRange {
                field: "traits",
                reason: format!("{} is outside 2..={MAX_TRAITS}", self.traits),
            });
        }
        if self.checkpoint_period == 0 {
            return Err(ConfigurationError::OutOfRange {
                field: "checkpoint_period",
                reason: "must be at least 1".to_owned(),
            });
        }
        probability("mutation", self.mutation)?;
        probability("selection_error", self.selection_error)?;
        probability("alpha", self.alpha)?;
        probability("alpha_prime", self.alpha_prime)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: usize) -> Result<(), ConfigurationError> {
    if value == 0 {
        return Err(ConfigurationError::OutOfRange {
            field,
            reason: "must be at least 1".to_owned(),
        });
    }
    Ok(())
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigurationError::OutOfRange {
            field,
            reason: format!("{value} is not a probability"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn model_tags_parse_in_both_forms() {
        assert_eq!("A".parse::<ModelKind>(), Ok(ModelKind::Axelrod));
        assert_eq!(" flache ".parse::<ModelKind>(), Ok(ModelKind::Flache));
        assert_eq!("Institutional".parse::<ModelKind>(), Ok(ModelKind::Institutional));
        assert!(matches!(
            "Q".parse::<ModelKind>(),
            Err(ConfigurationError::UnknownModel(tag)) if tag == "Q"
        ));
    }

    #[test]
    fn rejects_bad_probability() {
        let config = Configuration {
            mutation: 1.5,
            ..Configuration::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::OutOfRange { field: "mutation", .. })
        ));
    }

    #[test]
    fn rejects_single_trait_and_zero_period() {
        let config = Configuration {
            traits: 1,
            ..Configuration::default()
        };
        assert!(config.validate().is_err());
        let config = Configuration {
            checkpoint_period: 0,
            ..Configuration::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn serde_round_trip_uses_snake_case_tags() {
        let json = serde_json::to_string(&ModelKind::Institutional).unwrap_or_default();
        assert_eq!(json, "\"institutional\"");
    }
}
