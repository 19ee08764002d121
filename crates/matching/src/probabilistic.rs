//! Fellegi-Sunter probabilistic scorer
//!
//! Each field with configured m/u probabilities contributes `log2(m/u)` when
//! the values agree and `log2((1-m)/(1-u))` when they disagree. The summed
//! log-weight is rescaled to 0 - 100 with the configured calibration
//! constants:
//!
//! ```text
//! score = clamp(round((total + weight_offset) * weight_scale), 0, 100)
//! ```
//!
//! Birth dates are split into `birth_year`, `birth_month` and `birth_day`
//! agreements; years agree within `birth_year_tolerance`.
//!
//! A pair with no comparable field scores [`NO_EVIDENCE_SCORE`] rather than
//! the calibrated value of a zero total.

use tracing::debug;

use crate::comparator::{date_agreement, CompareContext, DateAgreement, FieldRegistry};
use crate::config::MatchingConfig;
use crate::script::ScriptNormalizer;
use crate::types::{fields::*, Record, ScoreBreakdown};

/// Score of a pair sharing no comparable field
pub const NO_EVIDENCE_SCORE: u8 = 0;

/// Probabilities are kept this far from 0 and 1 before taking logs
const PROBABILITY_FLOOR: f64 = 1e-6;

/// Log-likelihood weight of one field comparison
pub fn field_weight(agrees: bool, m: f64, u: f64) -> f64 {
    let m = m.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
    let u = u.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
    if agrees {
        (m / u).log2()
    } else {
        ((1.0 - m) / (1.0 - u)).log2()
    }
}

/// Fellegi-Sunter scorer over the configured m/u probabilities
#[derive(Debug, Clone)]
pub struct ProbabilisticScorer<'c> {
    config: &'c MatchingConfig,
    registry: FieldRegistry,
    normalizer: ScriptNormalizer,
}

impl<'c> ProbabilisticScorer<'c> {
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
        self.config.probabilistic.min_score
    }

    /// Summed log-weight of a record pair, `None` when no field was comparable
    pub fn total_weight(&self, a: &Record, b: &Record) -> Option<f64> {
        let (total, _) = self.evaluate(a, b);
        total
    }

    /// Score a record pair (0 - 100)
    pub fn score(&self, a: &Record, b: &Record) -> ScoreBreakdown {
        let (total, mut breakdown) = self.evaluate(a, b);
        let params = &self.config.probabilistic;

        breakdown.score = match total {
            Some(total) => ((total + params.weight_offset) * params.weight_scale)
                .round()
                .clamp(0.0, 100.0) as u8,
            None => NO_EVIDENCE_SCORE,
        };

        debug!(
            source_id = %a.id,
            target_id = %b.id,
            score = breakdown.score,
            total_weight = total.unwrap_or_default(),
            "Probabilistic score calculated"
        );

        breakdown
    }

    fn evaluate(&self, a: &Record, b: &Record) -> (Option<f64>, ScoreBreakdown) {
        let params = &self.config.probabilistic;
        let ctx = CompareContext {
            normalizer: &self.normalizer,
            fuzzy_matching: self.config.fuzzy_matching,
        };

        let dates: Option<DateAgreement> = match (a.text(BIRTH_DATE), b.text(BIRTH_DATE)) {
            (Some(date_a), Some(date_b)) => {
                Some(date_agreement(date_a, date_b, params.birth_year_tolerance))
            }
            _ => None,
        };

        let mut breakdown = ScoreBreakdown::default();
        let mut total: Option<f64> = None;

        for (field, &m) in self.registry.visit_order(&params.m_probabilities) {
            let Some(&u) = params.u_probabilities.get(field) else {
                continue;
            };

            let (label, comparator) = self.registry.describe(field);
            let agreement = match field {
                BIRTH_YEAR => dates.and_then(|d| d.year).map(|agrees| (agrees, percent(agrees))),
                BIRTH_MONTH => dates.and_then(|d| d.month).map(|agrees| (agrees, percent(agrees))),
                BIRTH_DAY => dates.and_then(|d| d.day).map(|agrees| (agrees, percent(agrees))),
                _ => match (a.field(field), b.field(field)) {
                    (Some(value_a), Some(value_b)) => {
                        comparator.agreement(value_a, value_b, &ctx, params.agreement_threshold)
                    }
                    _ => None,
                },
            };

            let Some((agrees, similarity)) = agreement else {
                continue;
            };

            *total.get_or_insert(0.0) += field_weight(agrees, m, u);
            breakdown.field_scores.insert(field.to_string(), similarity);
            if agrees {
                breakdown.matched_on.push(label.to_string());
            }
        }

        (total, breakdown)
    }
}

fn percent(agrees: bool) -> u8 {
    if agrees {
        100
    } else {
        0
    }
}
