//! End-of-run batch summary

use record_linkage_matching::PARTIAL_QUALIFIER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{BatchMatchJob, JobStatus, RecordMatchStatus};

/// Best-candidate confidence at or above this is high
pub const HIGH_CONFIDENCE: u8 = 80;
/// Best-candidate confidence at or above this is medium
pub const MEDIUM_CONFIDENCE: u8 = 60;

/// Best-candidate confidence bands over results with candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Totals and rates for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub total_records: usize,
    pub processed_records: usize,
    pub auto_matched: usize,
    pub manual_review: usize,
    pub no_match: usize,
    pub errors: usize,
    pub duration_ms: u64,
    pub records_per_second: f64,
    pub avg_record_time_ms: f64,
    pub confidence_distribution: ConfidenceDistribution,
    /// Field label -> share of best candidates matching on it (0.0 - 1.0)
    pub field_match_rates: BTreeMap<String, f64>,
    /// Source ids still waiting for a reviewer
    pub manual_review_ids: Vec<String>,
}

impl BatchSummary {
    /// Summarize a job after a run that took `elapsed`
    pub fn from_job(job: &BatchMatchJob, elapsed: Duration) -> Self {
        let progress = &job.progress;
        let processed = progress.processed_records;
        let seconds = elapsed.as_secs_f64();

        let mut distribution = ConfidenceDistribution::default();
        let mut label_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut with_candidates = 0usize;

        for best in job.results.iter().filter_map(|r| r.best_match()) {
            with_candidates += 1;
            match best.score {
                s if s >= HIGH_CONFIDENCE => distribution.high += 1,
                s if s >= MEDIUM_CONFIDENCE => distribution.medium += 1,
                _ => distribution.low += 1,
            }
            for label in &best.matched_on {
                let field = label.strip_suffix(PARTIAL_QUALIFIER).unwrap_or(label);
                *label_counts.entry(field.to_string()).or_default() += 1;
            }
        }

        let field_match_rates = label_counts
            .into_iter()
            .map(|(label, count)| (label, count as f64 / with_candidates as f64))
            .collect();

        Self {
            job_id: job.id.clone(),
            status: job.status,
            total_records: progress.total_records,
            processed_records: processed,
            auto_matched: progress.auto_matched,
            manual_review: progress.manual_review_queue,
            no_match: progress.no_match_found,
            errors: progress.errors,
            duration_ms: elapsed.as_millis() as u64,
            records_per_second: if seconds > 0.0 { processed as f64 / seconds } else { 0.0 },
            avg_record_time_ms: if processed > 0 {
                elapsed.as_secs_f64() * 1000.0 / processed as f64
            } else {
                0.0
            },
            confidence_distribution: distribution,
            field_match_rates,
            manual_review_ids: job
                .results
                .iter()
                .filter(|r| r.status == RecordMatchStatus::ManualReview)
                .map(|r| r.source_record_id.clone())
                .collect(),
        }
    }

    /// Whether every record reached a final outcome
    pub fn is_balanced(&self) -> bool {
        self.auto_matched + self.manual_review + self.no_match + self.errors == self.processed_records
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Batch {} ({}):", self.job_id, self.status)?;
        writeln!(
            f,
            "  Records: {}/{} processed, {} auto-matched, {} for review, {} no match, {} errors",
            self.processed_records,
            self.total_records,
            self.auto_matched,
            self.manual_review,
            self.no_match,
            self.errors
        )?;
        writeln!(
            f,
            "  Confidence: {} high, {} medium, {} low",
            self.confidence_distribution.high,
            self.confidence_distribution.medium,
            self.confidence_distribution.low
        )?;
        writeln!(
            f,
            "  Performance: {}ms total, {:.2}ms per record, {:.1} records/sec",
            self.duration_ms, self.avg_record_time_ms, self.records_per_second
        )?;
        Ok(())
    }
}
