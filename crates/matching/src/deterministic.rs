//! Deterministic weighted-field scorer
//!
//! Combines per-field comparator scores into a weighted average. Fields
//! missing on either side are left out of the average rather than counted
//! as disagreements.

use tracing::debug;

use crate::comparator::{CompareContext, FieldRegistry};
use crate::config::MatchingConfig;
use crate::script::ScriptNormalizer;
use crate::types::{Record, ScoreBreakdown};

/// Field scores above this are reported as a full match
pub const MATCH_LABEL_THRESHOLD: u8 = 80;

/// Field scores above this (up to [`MATCH_LABEL_THRESHOLD`]) are reported as partial
pub const PARTIAL_LABEL_THRESHOLD: u8 = 50;

/// Suffix appended to partially matching field labels
pub const PARTIAL_QUALIFIER: &str = " (partial)";

/// Weighted-average scorer over the configured field weights
#[derive(Debug, Clone)]
pub struct DeterministicScorer<'c> {
    config: &'c MatchingConfig,
    registry: FieldRegistry,
    normalizer: ScriptNormalizer,
}

impl<'c> DeterministicScorer<'c> {
    pub fn new(config: &'c MatchingConfig) -> Self {
        Self {
            config,
            registry: FieldRegistry::standard(),
            normalizer: ScriptNormalizer::new(config.language),
        }
    }

    /// Use a custom field registry
    pub fn with_registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Minimum score kept by the ranker
    pub fn min_score(&self) -> u8 {
        self.config.threshold.low
    }

    /// Score a record pair (0 - 100)
    pub fn score(&self, a: &Record, b: &Record) -> ScoreBreakdown {
        let ctx = CompareContext {
            normalizer: &self.normalizer,
            fuzzy_matching: self.config.fuzzy_matching,
        };

        let mut breakdown = ScoreBreakdown::default();
        let mut total = 0.0;
        let mut weight_sum = 0.0;

        for (field, &weight) in self.registry.visit_order(&self.config.field_weights) {
            if !(weight.is_finite() && weight > 0.0) {
                continue;
            }
            let (Some(value_a), Some(value_b)) = (a.field(field), b.field(field)) else {
                continue;
            };

            let (label, comparator) = self.registry.describe(field);
            let Some(score) = comparator.score(value_a, value_b, &ctx) else {
                continue;
            };

            total += f64::from(score) * weight;
            weight_sum += weight;
            breakdown.field_scores.insert(field.to_string(), score);

            if score > MATCH_LABEL_THRESHOLD {
                breakdown.matched_on.push(label.to_string());
            } else if score > PARTIAL_LABEL_THRESHOLD {
                breakdown
                    .matched_on
                    .push(format!("{}{}", label, PARTIAL_QUALIFIER));
            }
        }

        breakdown.score = if weight_sum > 0.0 {
            (total / weight_sum).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        debug!(
            source_id = %a.id,
            target_id = %b.id,
            score = breakdown.score,
            fields_compared = breakdown.field_scores.len(),
            "Deterministic score calculated"
        );

        breakdown
    }
}
