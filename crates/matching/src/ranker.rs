//! Candidate ranking
//!
//! Scores a source record against a pool of targets, drops candidates below
//! the algorithm's minimum score and orders the rest best first. Ties keep
//! pool order.

use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::comparator::FieldRegistry;
use crate::config::MatchingConfig;
use crate::deterministic::DeterministicScorer;
use crate::metrics::MatchingMetrics;
use crate::probabilistic::ProbabilisticScorer;
use crate::types::{Algorithm, CandidateMatch, Record, ScoreBreakdown};

/// Number of candidates callers usually present. `rank` never truncates.
pub const PRESENTATION_LIMIT: usize = 20;

/// Pairwise record scorer
pub trait Scorer: Send + Sync {
    /// Score a record pair (0 - 100)
    fn score(&self, a: &Record, b: &Record) -> ScoreBreakdown;

    /// Candidates scoring below this are dropped by the ranker
    fn min_score(&self) -> u8;
}

impl Scorer for DeterministicScorer<'_> {
    fn score(&self, a: &Record, b: &Record) -> ScoreBreakdown {
        DeterministicScorer::score(self, a, b)
    }

    fn min_score(&self) -> u8 {
        DeterministicScorer::min_score(self)
    }
}

impl Scorer for ProbabilisticScorer<'_> {
    fn score(&self, a: &Record, b: &Record) -> ScoreBreakdown {
        ProbabilisticScorer::score(self, a, b)
    }

    fn min_score(&self) -> u8 {
        ProbabilisticScorer::min_score(self)
    }
}

/// Scorer for an algorithm over the standard field registry
pub fn scorer_for<'c>(config: &'c MatchingConfig, algorithm: Algorithm) -> Box<dyn Scorer + 'c> {
    scorer_with_registry(config, algorithm, FieldRegistry::standard())
}

/// Scorer for an algorithm over a custom field registry
pub fn scorer_with_registry<'c>(
    config: &'c MatchingConfig,
    algorithm: Algorithm,
    registry: FieldRegistry,
) -> Box<dyn Scorer + 'c> {
    match algorithm {
        Algorithm::Deterministic => {
            Box::new(DeterministicScorer::new(config).with_registry(registry))
        }
        Algorithm::Probabilistic => {
            Box::new(ProbabilisticScorer::new(config).with_registry(registry))
        }
    }
}

/// Score one record pair
pub fn score(a: &Record, b: &Record, config: &MatchingConfig, algorithm: Algorithm) -> ScoreBreakdown {
    scorer_for(config, algorithm).score(a, b)
}

/// Rank a pool of targets against a source record
pub fn rank(
    source: &Record,
    pool: &[Record],
    config: &MatchingConfig,
    algorithm: Algorithm,
) -> Vec<CandidateMatch> {
    Ranker::new(config, algorithm).rank(source, pool)
}

/// Candidate ranker over one scorer
pub struct Ranker<'c> {
    scorer: Box<dyn Scorer + 'c>,
    algorithm: Algorithm,
    metrics: Option<Arc<MatchingMetrics>>,
}

impl<'c> Ranker<'c> {
    pub fn new(config: &'c MatchingConfig, algorithm: Algorithm) -> Self {
        Self {
            scorer: scorer_for(config, algorithm),
            algorithm,
            metrics: None,
        }
    }

    /// Rank with a custom scorer
    pub fn with_scorer(mut self, scorer: Box<dyn Scorer + 'c>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Record every ranking into shared metrics
    pub fn with_metrics(mut self, metrics: Arc<MatchingMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn min_score(&self) -> u8 {
        self.scorer.min_score()
    }

    /// Score every target, drop those below the minimum and sort descending
    pub fn rank(&self, source: &Record, pool: &[Record]) -> Vec<CandidateMatch> {
        let start = Instant::now();
        let min_score = self.scorer.min_score();

        let mut candidates: Vec<CandidateMatch> = pool
            .iter()
            .filter_map(|target| {
                let breakdown = self.scorer.score(source, target);
                (breakdown.score >= min_score).then(|| breakdown.into_candidate(target.clone()))
            })
            .collect();

        // Stable sort keeps pool order among equal scores
        candidates.sort_by(|a, b| b.score.cmp(&a.score));

        if let Some(metrics) = &self.metrics {
            metrics.record_ranking(self.algorithm, pool.len(), candidates.len(), start.elapsed());
        }

        debug!(
            source_id = %source.id,
            pool_size = pool.len(),
            candidates = candidates.len(),
            best_score = candidates.first().map(|c| c.score),
            "Ranking complete"
        );

        candidates
    }
}

impl std::fmt::Debug for Ranker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ranker")
            .field("algorithm", &self.algorithm)
            .field("min_score", &self.scorer.min_score())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fields::*;

    fn source() -> Record {
        Record::new("s1")
            .with_field(FIRST_NAME, "John")
            .with_field(LAST_NAME, "Smith")
            .with_field(BIRTH_DATE, "1980-05-01")
            .with_field(GENDER, "Male")
    }

    fn pool() -> Vec<Record> {
        vec![
            Record::new("t-gender-only")
                .with_field(FIRST_NAME, "Abebe")
                .with_field(LAST_NAME, "Tesfaye")
                .with_field(GENDER, "Male"),
            Record::new("t-jon")
                .with_field(FIRST_NAME, "Jon")
                .with_field(LAST_NAME, "Smith")
                .with_field(BIRTH_DATE, "1980-05-01")
                .with_field(GENDER, "Male"),
            Record::new("t-exact")
                .with_field(FIRST_NAME, "John")
                .with_field(LAST_NAME, "Smith")
                .with_field(BIRTH_DATE, "1980-05-01")
                .with_field(GENDER, "Male"),
        ]
    }

    #[test]
    fn test_rank_orders_and_filters() {
        let config = MatchingConfig::default();
        let ranked = rank(&source(), &pool(), &config, Algorithm::Deterministic);

        let ids: Vec<&str> = ranked.iter().map(|c| c.record.id.as_str()).collect();
        assert_eq!(ids, vec!["t-exact", "t-jon"]);
        assert_eq!(ranked[0].score, 100);
        assert_eq!(ranked[1].score, 92);
    }

    #[test]
    fn test_rank_probabilistic_uses_min_score() {
        let config = MatchingConfig::default();
        let ranked = rank(&source(), &pool(), &config, Algorithm::Probabilistic);

        assert!(ranked.iter().all(|c| c.score >= config.probabilistic.min_score));
        assert!(!ranked.iter().any(|c| c.record.id == "t-gender-only"));
    }

    #[test]
    fn test_ties_keep_pool_order() {
        let config = MatchingConfig::default();
        let pool = vec![
            source().with_field(FIRST_NAME, "Jon"),
            Record::new("second")
                .with_field(FIRST_NAME, "Jon")
                .with_field(LAST_NAME, "Smith")
                .with_field(BIRTH_DATE, "1980-05-01")
                .with_field(GENDER, "Male"),
        ];

        let ranked = rank(&source(), &pool, &config, Algorithm::Deterministic);
        assert_eq!(ranked[0].record.id, "s1");
        assert_eq!(ranked[1].record.id, "second");
    }

    #[test]
    fn test_rank_empty_pool() {
        let config = MatchingConfig::default();
        assert!(rank(&source(), &[], &config, Algorithm::Deterministic).is_empty());
    }

    #[test]
    fn test_ranker_records_metrics() {
        let config = MatchingConfig::default();
        let metrics = Arc::new(MatchingMetrics::new());
        let ranker = Ranker::new(&config, Algorithm::Deterministic).with_metrics(Arc::clone(&metrics));

        ranker.rank(&source(), &pool());
        ranker.rank(&source(), &[]);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rankings, 2);
        assert_eq!(snapshot.candidates_scanned, 3);
        assert_eq!(snapshot.candidates_returned, 2);
        assert_eq!(snapshot.empty_rankings, 1);
    }

    #[test]
    fn test_custom_scorer() {
        struct Constant;
        impl Scorer for Constant {
            fn score(&self, _: &Record, _: &Record) -> ScoreBreakdown {
                ScoreBreakdown {
                    score: 55,
                    ..Default::default()
                }
            }
            fn min_score(&self) -> u8 {
                50
            }
        }

        let config = MatchingConfig::default();
        let ranker = Ranker::new(&config, Algorithm::Deterministic).with_scorer(Box::new(Constant));

        let ranked = ranker.rank(&source(), &pool());
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|c| c.score == 55));
    }
}
