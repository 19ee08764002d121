//! Batch job types

use chrono::{DateTime, Utc};
use record_linkage_matching::{Algorithm, CandidateMatch, Record};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::BatchError;

/// How the best candidate of a record is turned into a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoMatchStrategy {
    /// Same bands as `ThresholdBased`
    HighConfidenceOnly,
    /// Auto-match above the auto threshold, review above the review threshold
    #[default]
    ThresholdBased,
    /// Every record with candidates goes to manual review
    ManualReviewAll,
    /// Auto-match only a single candidate above the auto threshold
    BestMatchOnly,
}

/// Batch acceptance policy and pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchMatchConfig {
    pub auto_match_threshold: u8,
    pub manual_review_threshold: u8,
    pub auto_match_strategy: AutoMatchStrategy,
    /// Candidates kept per source record
    pub max_matches_per_record: usize,
    /// Records processed between pauses
    pub batch_size: usize,
    pub pause_between_batches_ms: u64,
    /// Force no-match when the best score is below the review threshold
    pub skip_no_matches: bool,
}

impl Default for BatchMatchConfig {
    fn default() -> Self {
        Self {
            auto_match_threshold: 90,
            manual_review_threshold: 60,
            auto_match_strategy: AutoMatchStrategy::ThresholdBased,
            max_matches_per_record: 5,
            batch_size: 50,
            pause_between_batches_ms: 100,
            skip_no_matches: false,
        }
    }
}

impl BatchMatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send every record with a candidate to manual review
    pub fn review_everything() -> Self {
        Self {
            auto_match_strategy: AutoMatchStrategy::ManualReviewAll,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON config. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, BatchError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_thresholds(mut self, auto_match: u8, manual_review: u8) -> Self {
        self.auto_match_threshold = auto_match;
        self.manual_review_threshold = manual_review;
        self
    }

    pub fn with_strategy(mut self, strategy: AutoMatchStrategy) -> Self {
        self.auto_match_strategy = strategy;
        self
    }

    pub fn with_max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches_per_record = max_matches;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause_between_batches_ms = pause.as_millis() as u64;
        self
    }

    pub fn with_skip_no_matches(mut self, skip: bool) -> Self {
        self.skip_no_matches = skip;
        self
    }

    /// Pause between batches
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_between_batches_ms)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.auto_match_threshold > 100 {
            return Err(BatchError::InvalidConfig(format!(
                "auto_match_threshold must be at most 100, got {}",
                self.auto_match_threshold
            )));
        }
        if self.manual_review_threshold > self.auto_match_threshold {
            return Err(BatchError::InvalidConfig(format!(
                "manual_review_threshold ({}) must not exceed auto_match_threshold ({})",
                self.manual_review_threshold, self.auto_match_threshold
            )));
        }
        if self.max_matches_per_record == 0 {
            return Err(BatchError::InvalidConfig(
                "max_matches_per_record must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(BatchError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Job lifecycle: `pending -> running -> {completed, cancelled, error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Cancelled,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Outcome for one source record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordMatchStatus {
    AutoMatched,
    ManualReview,
    NoMatch,
    Error,
}

/// Running counters for a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total_records: usize,
    pub processed_records: usize,
    pub auto_matched: usize,
    pub manual_review_queue: usize,
    pub no_match_found: usize,
    pub errors: usize,
    pub started_at: Option<DateTime<Utc>>,
    /// Projected from the average time per processed record
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl BatchProgress {
    pub fn new(total_records: usize) -> Self {
        Self {
            total_records,
            ..Default::default()
        }
    }

    /// Processed share (0 - 100)
    pub fn percent(&self) -> u8 {
        if self.total_records == 0 {
            return 100;
        }
        (self.processed_records.min(self.total_records) * 100 / self.total_records) as u8
    }

    pub fn remaining(&self) -> usize {
        self.total_records.saturating_sub(self.processed_records)
    }

    /// Count one processed record and refresh the completion estimate
    pub fn record(&mut self, status: RecordMatchStatus, now: DateTime<Utc>) {
        self.processed_records += 1;
        match status {
            RecordMatchStatus::AutoMatched => self.auto_matched += 1,
            RecordMatchStatus::ManualReview => self.manual_review_queue += 1,
            RecordMatchStatus::NoMatch => self.no_match_found += 1,
            RecordMatchStatus::Error => self.errors += 1,
        }

        if let Some(started_at) = self.started_at {
            let per_record = (now - started_at) / self.processed_records as i32;
            self.estimated_completion = Some(now + per_record * self.remaining() as i32);
        }
    }
}

/// Result for one source record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMatchResult {
    pub source_record_id: String,
    pub status: RecordMatchStatus,
    /// Ranked candidates, truncated to `max_matches_per_record`
    pub matches: Vec<CandidateMatch>,
    /// Score of the best candidate, 0 without candidates
    pub confidence: u8,
    /// Target chosen when auto-matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl BatchMatchResult {
    pub fn best_match(&self) -> Option<&CandidateMatch> {
        self.matches.first()
    }

    /// Failed record
    pub fn failed(source_record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_record_id: source_record_id.into(),
            status: RecordMatchStatus::Error,
            matches: Vec::new(),
            confidence: 0,
            matched_record_id: None,
            error: Some(message.into()),
            processed_at: Utc::now(),
        }
    }
}

/// A recorded failure. `record_id` is `None` for job-level failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMatchError {
    pub record_id: Option<String>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl BatchMatchError {
    pub fn record(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn job(message: impl Into<String>) -> Self {
        Self {
            record_id: None,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// A batch matching job and its accumulated results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMatchJob {
    pub id: String,
    /// Persisted apart from the job state, not serialized with it
    #[serde(skip)]
    pub source_records: Vec<Record>,
    #[serde(skip)]
    pub target_records: Vec<Record>,
    pub config: BatchMatchConfig,
    /// Scoring algorithm, set when the job starts
    pub algorithm: Algorithm,
    pub status: JobStatus,
    pub progress: BatchProgress,
    pub results: Vec<BatchMatchResult>,
    pub errors: Vec<BatchMatchError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchMatchJob {
    pub fn new(source_records: Vec<Record>, target_records: Vec<Record>, config: BatchMatchConfig) -> Self {
        let total = source_records.len();
        Self {
            id: Uuid::new_v4().to_string(),
            source_records,
            target_records,
            config,
            algorithm: Algorithm::default(),
            status: JobStatus::Pending,
            progress: BatchProgress::new(total),
            results: Vec::new(),
            errors: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Source ids still waiting for a reviewer
    pub fn manual_review_ids(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.status == RecordMatchStatus::ManualReview)
            .map(|r| r.source_record_id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BatchMatchConfig::default().validate().is_ok());
        assert!(BatchMatchConfig::review_everything().validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(BatchMatchConfig::new().with_thresholds(50, 70).validate().is_err());
        assert!(BatchMatchConfig::new().with_batch_size(0).validate().is_err());
        assert!(BatchMatchConfig::new().with_max_matches(0).validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config = BatchMatchConfig::from_json(
            r#"{ "auto_match_strategy": "best-match-only", "batch_size": 10 }"#,
        )
        .unwrap();
        assert_eq!(config.auto_match_strategy, AutoMatchStrategy::BestMatchOnly);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.auto_match_threshold, 90);

        assert!(BatchMatchConfig::from_json(r#"{ "batch_size": 0 }"#).is_err());
    }

    #[test]
    fn test_progress_counts_and_percent() {
        let mut progress = BatchProgress::new(4);
        let now = Utc::now();
        progress.started_at = Some(now);

        progress.record(RecordMatchStatus::AutoMatched, now + chrono::Duration::seconds(1));
        assert_eq!(progress.percent(), 25);

        progress.record(RecordMatchStatus::Error, now + chrono::Duration::seconds(2));
        assert_eq!(progress.percent(), 50);
        assert_eq!(progress.auto_matched, 1);
        assert_eq!(progress.errors, 1);
        assert_eq!(
            progress.estimated_completion,
            Some(now + chrono::Duration::seconds(4))
        );
    }

    #[test]
    fn test_empty_job_is_fully_processed() {
        assert_eq!(BatchProgress::new(0).percent(), 100);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Cancelled.to_string(), "cancelled");
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
