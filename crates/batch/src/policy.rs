//! Match acceptance policy

use record_linkage_matching::CandidateMatch;

use crate::types::{AutoMatchStrategy, BatchMatchConfig, RecordMatchStatus};

/// Decide the outcome for a record from all of its ranked candidates, best
/// first. Pass the list before truncating it to `max_matches_per_record`,
/// otherwise `best-match-only` cannot see the alternatives.
pub fn classify(candidates: &[CandidateMatch], config: &BatchMatchConfig) -> RecordMatchStatus {
    let Some(best) = candidates.first() else {
        return RecordMatchStatus::NoMatch;
    };

    if config.skip_no_matches && best.score < config.manual_review_threshold {
        return RecordMatchStatus::NoMatch;
    }

    match config.auto_match_strategy {
        AutoMatchStrategy::HighConfidenceOnly | AutoMatchStrategy::ThresholdBased => {
            if best.score >= config.auto_match_threshold {
                RecordMatchStatus::AutoMatched
            } else if best.score >= config.manual_review_threshold {
                RecordMatchStatus::ManualReview
            } else {
                RecordMatchStatus::NoMatch
            }
        }
        AutoMatchStrategy::ManualReviewAll => RecordMatchStatus::ManualReview,
        AutoMatchStrategy::BestMatchOnly => {
            if best.score >= config.auto_match_threshold && candidates.len() == 1 {
                RecordMatchStatus::AutoMatched
            } else {
                RecordMatchStatus::ManualReview
            }
        }
    }
}
