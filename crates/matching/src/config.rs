//! Matching configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MatchingError;
use crate::script::LanguageConfig;
use crate::similarity::JARO_WINKLER_AGREEMENT;
use crate::types::fields::*;

/// Field name -> weight for the deterministic scorer
pub type FieldWeights = BTreeMap<String, f64>;

/// Field name -> probability for the probabilistic scorer
pub type FieldProbabilities = BTreeMap<String, f64>;

/// Log-weight offset applied before rescaling Fellegi-Sunter totals
pub const DEFAULT_WEIGHT_OFFSET: f64 = 12.0;

/// Factor rescaling offset Fellegi-Sunter totals to 0 - 100
pub const DEFAULT_WEIGHT_SCALE: f64 = 5.0;

/// Default minimum probabilistic score kept by the ranker
pub const DEFAULT_MIN_PROBABILISTIC_SCORE: u8 = 40;

/// Default birth year window for probabilistic year agreement.
/// Some deployments use 10 years; set `birth_year_tolerance` to match.
pub const DEFAULT_BIRTH_YEAR_TOLERANCE: u32 = 3;

/// Default deterministic field weights
pub fn default_field_weights() -> FieldWeights {
    [
        (FIRST_NAME, 20.0),
        (MIDDLE_NAME, 5.0),
        (LAST_NAME, 20.0),
        (BIRTH_DATE, 15.0),
        (GENDER, 10.0),
        (VILLAGE, 10.0),
        (SUB_VILLAGE, 5.0),
        (PHONE, 10.0),
        (HOUSEHOLD_HEAD, 5.0),
        (IDENTIFIERS, 15.0),
    ]
    .into_iter()
    .map(|(field, weight)| (field.to_string(), weight))
    .collect()
}

/// Default m-probabilities (agreement given a true match)
pub fn default_m_probabilities() -> FieldProbabilities {
    [
        (FIRST_NAME, 0.92),
        (MIDDLE_NAME, 0.85),
        (LAST_NAME, 0.93),
        (GENDER, 0.98),
        (BIRTH_YEAR, 0.90),
        (BIRTH_MONTH, 0.85),
        (BIRTH_DAY, 0.85),
        (VILLAGE, 0.85),
        (SUB_VILLAGE, 0.80),
        (PHONE, 0.90),
        (HOUSEHOLD_HEAD, 0.80),
        (IDENTIFIERS, 0.95),
    ]
    .into_iter()
    .map(|(field, p)| (field.to_string(), p))
    .collect()
}

/// Default u-probabilities (agreement by chance given a non-match)
pub fn default_u_probabilities() -> FieldProbabilities {
    [
        (FIRST_NAME, 0.02),
        (MIDDLE_NAME, 0.05),
        (LAST_NAME, 0.02),
        (GENDER, 0.5),
        (BIRTH_YEAR, 0.10),
        (BIRTH_MONTH, 0.083),
        (BIRTH_DAY, 0.033),
        (VILLAGE, 0.10),
        (SUB_VILLAGE, 0.15),
        (PHONE, 0.01),
        (HOUSEHOLD_HEAD, 0.05),
        (IDENTIFIERS, 0.001),
    ]
    .into_iter()
    .map(|(field, p)| (field.to_string(), p))
    .collect()
}

/// Confidence bands (0 - 100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub high: u8,
    pub medium: u8,
    /// Minimum deterministic score kept by the ranker
    pub low: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: 80,
            medium: 60,
            low: 40,
        }
    }
}

/// Fellegi-Sunter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilisticConfig {
    /// m-probability per field
    pub m_probabilities: FieldProbabilities,
    /// u-probability per field
    pub u_probabilities: FieldProbabilities,
    /// Minimum score kept by the ranker
    pub min_score: u8,
    /// Birth years within this many years agree
    pub birth_year_tolerance: u32,
    /// Jaro-Winkler similarity at which fuzzy fields agree
    pub agreement_threshold: f64,
    /// Calibration offset added to the total log-weight
    pub weight_offset: f64,
    /// Calibration factor applied after the offset
    pub weight_scale: f64,
}

impl Default for ProbabilisticConfig {
    fn default() -> Self {
        Self {
            m_probabilities: default_m_probabilities(),
            u_probabilities: default_u_probabilities(),
            min_score: DEFAULT_MIN_PROBABILISTIC_SCORE,
            birth_year_tolerance: DEFAULT_BIRTH_YEAR_TOLERANCE,
            agreement_threshold: JARO_WINKLER_AGREEMENT,
            weight_offset: DEFAULT_WEIGHT_OFFSET,
            weight_scale: DEFAULT_WEIGHT_SCALE,
        }
    }
}

impl ProbabilisticConfig {
    /// Set m and u probabilities for a field
    pub fn with_probabilities(mut self, field: impl Into<String>, m: f64, u: f64) -> Self {
        let field = field.into();
        self.m_probabilities.insert(field.clone(), m);
        self.u_probabilities.insert(field, u);
        self
    }

    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_birth_year_tolerance(mut self, years: u32) -> Self {
        self.birth_year_tolerance = years;
        self
    }

    /// Override the rescaling constants
    pub fn with_calibration(mut self, offset: f64, scale: f64) -> Self {
        self.weight_offset = offset;
        self.weight_scale = scale;
        self
    }

    fn validate(&self) -> Result<(), MatchingError> {
        for (kind, table) in [("m", &self.m_probabilities), ("u", &self.u_probabilities)] {
            for (field, p) in table {
                if !(p.is_finite() && *p > 0.0 && *p < 1.0) {
                    return Err(MatchingError::InvalidConfig(format!(
                        "{}-probability for '{}' must be in (0, 1), got {}",
                        kind, field, p
                    )));
                }
            }
        }
        if self.min_score > 100 {
            return Err(MatchingError::InvalidConfig(format!(
                "min_score must be at most 100, got {}",
                self.min_score
            )));
        }
        if !(0.0..=1.0).contains(&self.agreement_threshold) {
            return Err(MatchingError::InvalidConfig(format!(
                "agreement_threshold must be in [0, 1], got {}",
                self.agreement_threshold
            )));
        }
        if !self.weight_offset.is_finite() || !(self.weight_scale.is_finite() && self.weight_scale > 0.0) {
            return Err(MatchingError::InvalidConfig(
                "calibration constants must be finite with a positive scale".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for scoring and ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Deterministic weight per field
    pub field_weights: FieldWeights,
    /// Confidence bands
    pub threshold: Thresholds,
    /// Use edit-distance similarity instead of the containment/prefix fallback
    pub fuzzy_matching: bool,
    /// Normalization language settings
    pub language: LanguageConfig,
    /// Fellegi-Sunter parameters
    pub probabilistic: ProbabilisticConfig,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            field_weights: default_field_weights(),
            threshold: Thresholds::default(),
            fuzzy_matching: true,
            language: LanguageConfig::default(),
            probabilistic: ProbabilisticConfig::default(),
        }
    }
}

impl MatchingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config that only keeps strong candidates
    pub fn strict() -> Self {
        Self {
            threshold: Thresholds {
                high: 90,
                medium: 75,
                low: 60,
            },
            ..Default::default()
        }
    }

    /// Config that keeps weak candidates for review
    pub fn lenient() -> Self {
        Self {
            threshold: Thresholds {
                high: 70,
                medium: 50,
                low: 30,
            },
            ..Default::default()
        }
    }

    /// Parse and validate a JSON config. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, MatchingError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the weight of a field (custom fields included)
    pub fn with_weight(mut self, field: impl Into<String>, weight: f64) -> Self {
        self.field_weights.insert(field.into(), weight);
        self
    }

    /// Replace all field weights
    pub fn with_weights(mut self, weights: FieldWeights) -> Self {
        self.field_weights = weights;
        self
    }

    pub fn with_thresholds(mut self, high: u8, medium: u8, low: u8) -> Self {
        self.threshold = Thresholds { high, medium, low };
        self
    }

    pub fn with_fuzzy_matching(mut self, enabled: bool) -> Self {
        self.fuzzy_matching = enabled;
        self
    }

    pub fn with_language(mut self, language: LanguageConfig) -> Self {
        self.language = language;
        self
    }

    pub fn with_probabilistic(mut self, probabilistic: ProbabilisticConfig) -> Self {
        self.probabilistic = probabilistic;
        self
    }

    /// Check thresholds, weights and probabilities
    pub fn validate(&self) -> Result<(), MatchingError> {
        let Thresholds { high, medium, low } = self.threshold;
        if high > 100 {
            return Err(MatchingError::InvalidConfig(format!(
                "thresholds must be at most 100, got high = {}",
                high
            )));
        }
        if !(low <= medium && medium <= high) {
            return Err(MatchingError::InvalidConfig(format!(
                "thresholds must satisfy low <= medium <= high, got {} / {} / {}",
                low, medium, high
            )));
        }

        for (field, weight) in &self.field_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(MatchingError::InvalidConfig(format!(
                    "weight for '{}' must be a non-negative number, got {}",
                    field, weight
                )));
            }
        }

        self.probabilistic.validate()
    }
}
