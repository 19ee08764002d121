//! Batch orchestrator
//!
//! Drives a job through `pending -> running -> {completed, cancelled, error}`,
//! one source record at a time. Per-record failures, panics included, are
//! recorded and the batch continues.
//!
//! Source and target records are persisted once when the job is created. The
//! job state (status, progress, results, errors) is persisted after every
//! record.
//!
//! Status transitions that start or end a run, cancellation and deletion are
//! serialized per matcher. A job left `running` by a run that was dropped
//! before finishing can still be cancelled or deleted.

use chrono::Utc;
use record_linkage_matching::{
    Algorithm, MatchingConfig, MatchingError, MatchingMetrics, Ranker, Record,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cancellation::{CancellationRegistry, CancellationToken};
use crate::decision::{DecisionLog, MatchResult, AUTO_MATCHER};
use crate::error::BatchError;
use crate::policy::classify;
use crate::store::JobStore;
use crate::summary::BatchSummary;
use crate::types::{
    BatchMatchConfig, BatchMatchError, BatchMatchJob, BatchMatchResult, JobStatus,
    RecordMatchStatus,
};

const JOB_KEY_PREFIX: &str = "batch-job:";
const RECORDS_KEY_PREFIX: &str = "batch-job-records:";

type ProgressHook = Arc<dyn Fn(u8) + Send + Sync>;
type CompleteHook = Arc<dyn Fn(&BatchSummary) + Send + Sync>;

/// Callbacks invoked during a run
#[derive(Clone, Default)]
pub struct RunHooks {
    on_progress: Option<ProgressHook>,
    on_complete: Option<CompleteHook>,
}

impl RunHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the processed percentage (0 - 100) after every record
    pub fn on_progress(mut self, hook: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(hook));
        self
    }

    /// Called once with the summary when a run ends without a job error
    pub fn on_complete(mut self, hook: impl Fn(&BatchSummary) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for RunHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHooks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

#[derive(Serialize)]
struct RecordsRef<'a> {
    source_records: &'a [Record],
    target_records: &'a [Record],
}

#[derive(Deserialize)]
struct StoredRecords {
    source_records: Vec<Record>,
    target_records: Vec<Record>,
}

/// Marks a job as driven by a live run until dropped
struct ActiveRun<'a> {
    active: &'a parking_lot::Mutex<HashSet<String>>,
    job_id: String,
}

impl<'a> ActiveRun<'a> {
    fn claim(active: &'a parking_lot::Mutex<HashSet<String>>, job_id: &str) -> Self {
        active.lock().insert(job_id.to_string());
        Self {
            active,
            job_id: job_id.to_string(),
        }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.active.lock().remove(&self.job_id);
    }
}

/// Creates, runs and tracks batch matching jobs
pub struct BatchMatcher {
    store: Arc<dyn JobStore>,
    cancellations: CancellationRegistry,
    metrics: Arc<MatchingMetrics>,
    decisions: DecisionLog,
    lifecycle: tokio::sync::Mutex<()>,
    /// Jobs with a live run in this matcher
    active: parking_lot::Mutex<HashSet<String>>,
}

impl BatchMatcher {
    /// Matcher persisting jobs and decisions in `store`.
    ///
    /// Decisions share the store's retention. Use
    /// [`with_decision_store`](Self::with_decision_store) to keep them apart
    /// from job state.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            decisions: DecisionLog::new(Arc::clone(&store)),
            store,
            cancellations: CancellationRegistry::new(),
            metrics: Arc::new(MatchingMetrics::new()),
            lifecycle: tokio::sync::Mutex::new(()),
            active: parking_lot::Mutex::new(HashSet::new()),
        }
    }

    /// Persist decisions in their own store
    pub fn with_decision_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.decisions = DecisionLog::new(store);
        self
    }

    /// Share ranking metrics with other components
    pub fn with_metrics(mut self, metrics: Arc<MatchingMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MatchingMetrics> {
        &self.metrics
    }

    /// Decisions recorded by completed jobs and reviewers
    pub fn decisions(&self) -> &DecisionLog {
        &self.decisions
    }

    fn job_key(job_id: &str) -> String {
        format!("{}{}", JOB_KEY_PREFIX, job_id)
    }

    fn records_key(job_id: &str) -> String {
        format!("{}{}", RECORDS_KEY_PREFIX, job_id)
    }

    fn is_active(&self, job_id: &str) -> bool {
        self.active.lock().contains(job_id)
    }

    /// Save the job state. Records are not part of it.
    async fn save_job(&self, job: &BatchMatchJob) -> Result<(), BatchError> {
        let value = serde_json::to_value(job)?;
        self.store.save(&Self::job_key(&job.id), value).await?;
        Ok(())
    }

    async fn save_records(&self, job: &BatchMatchJob) -> Result<(), BatchError> {
        let value = serde_json::to_value(RecordsRef {
            source_records: &job.source_records,
            target_records: &job.target_records,
        })?;
        self.store.save(&Self::records_key(&job.id), value).await?;
        Ok(())
    }

    /// Create and persist a pending job
    pub async fn create_batch_job(
        &self,
        source_records: Vec<Record>,
        target_records: Vec<Record>,
        config: BatchMatchConfig,
    ) -> Result<BatchMatchJob, BatchError> {
        config.validate()?;

        let job = BatchMatchJob::new(source_records, target_records, config);
        self.save_records(&job).await?;
        self.save_job(&job).await?;

        info!(
            job_id = %job.id,
            sources = job.source_records.len(),
            targets = job.target_records.len(),
            backend = self.store.backend_name(),
            "Batch job created"
        );

        Ok(job)
    }

    /// Load a job with its records
    pub async fn get_batch_job(&self, job_id: &str) -> Result<Option<BatchMatchJob>, BatchError> {
        let Some(state) = self.store.load(&Self::job_key(job_id)).await? else {
            return Ok(None);
        };
        let mut job: BatchMatchJob = serde_json::from_value(state)?;

        let records: StoredRecords = match self.store.load(&Self::records_key(job_id)).await? {
            Some(value) => serde_json::from_value(value)?,
            None => return Err(BatchError::MissingRecords(job_id.to_string())),
        };
        job.source_records = records.source_records;
        job.target_records = records.target_records;

        Ok(Some(job))
    }

    /// Delete a job that has no live run. Returns whether it existed.
    pub async fn delete_batch_job(&self, job_id: &str) -> Result<bool, BatchError> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.is_active(job_id) {
            return Err(BatchError::InvalidState {
                job_id: job_id.to_string(),
                status: JobStatus::Running,
            });
        }

        let deleted = self.store.delete(&Self::job_key(job_id)).await?;
        self.store.delete(&Self::records_key(job_id)).await?;
        self.cancellations.release(job_id);
        debug!(job_id, deleted, "Batch job deleted");
        Ok(deleted)
    }

    /// Token observed by the job's run. Cancelling it stops the run before
    /// the next record.
    pub fn cancellation_token(&self, job_id: &str) -> CancellationToken {
        self.cancellations.token(job_id)
    }

    /// Cancel a pending or running job.
    ///
    /// A live run stops before its next record. A job still marked `running`
    /// without a live run is cancelled directly.
    pub async fn cancel_batch_job(&self, job_id: &str) -> Result<(), BatchError> {
        let _lifecycle = self.lifecycle.lock().await;

        let mut job = self
            .get_batch_job(job_id)
            .await?
            .ok_or_else(|| BatchError::JobNotFound(job_id.to_string()))?;

        match job.status {
            JobStatus::Pending => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                self.save_job(&job).await?;
                self.cancellations.release(job_id);
                info!(job_id, "Pending batch job cancelled");
            }
            JobStatus::Running if self.is_active(job_id) => {
                self.cancellations.cancel(job_id);
                info!(job_id, "Cancellation requested for running batch job");
            }
            JobStatus::Running => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                job.errors
                    .push(BatchMatchError::job("run stopped before reaching a final state"));
                self.save_job(&job).await?;
                self.cancellations.release(job_id);
                warn!(
                    job_id,
                    processed = job.progress.processed_records,
                    "Abandoned batch job cancelled"
                );
            }
            status => {
                return Err(BatchError::InvalidState {
                    job_id: job_id.to_string(),
                    status,
                });
            }
        }

        Ok(())
    }

    /// Run a pending job to completion, cancellation or failure
    pub async fn run_batch_job(
        &self,
        job_id: &str,
        matching_config: &MatchingConfig,
        algorithm: Algorithm,
        hooks: RunHooks,
    ) -> Result<BatchSummary, BatchError> {
        let (mut job, run) = {
            let _lifecycle = self.lifecycle.lock().await;

            let mut job = self
                .get_batch_job(job_id)
                .await?
                .ok_or_else(|| BatchError::JobNotFound(job_id.to_string()))?;

            if job.status != JobStatus::Pending {
                return Err(BatchError::InvalidState {
                    job_id: job_id.to_string(),
                    status: job.status,
                });
            }

            if let Err(e) = matching_config.validate() {
                return Err(self.fail_job(&mut job, e.into()).await);
            }

            let run = ActiveRun::claim(&self.active, job_id);
            let now = Utc::now();
            job.status = JobStatus::Running;
            job.algorithm = algorithm;
            job.started_at = Some(now);
            job.progress.started_at = Some(now);
            if let Err(e) = self.save_job(&job).await {
                return Err(self.fail_job(&mut job, e).await);
            }

            (job, run)
        };

        info!(
            job_id,
            total_records = job.progress.total_records,
            algorithm = ?algorithm,
            "Batch job started"
        );

        let started = Instant::now();
        let token = self.cancellations.token(job_id);
        let ranker = Ranker::new(matching_config, algorithm).with_metrics(Arc::clone(&self.metrics));
        let batch_size = job.config.batch_size.max(1);
        let pause = job.config.pause();
        let total = job.source_records.len();

        for index in 0..total {
            if token.is_cancelled() {
                job.status = JobStatus::Cancelled;
                info!(job_id, processed = job.progress.processed_records, "Batch job cancelled");
                break;
            }

            let result = process_record(&ranker, &job.source_records[index], &job.target_records, &job.config);

            if let Some(message) = &result.error {
                warn!(job_id, record_id = %result.source_record_id, error = %message, "Record failed");
                job.errors
                    .push(BatchMatchError::record(result.source_record_id.clone(), message.clone()));
            }

            job.progress.record(result.status, result.processed_at);
            job.results.push(result);

            if let Err(e) = self.save_job(&job).await {
                return Err(self.fail_run(&mut job, e, run).await);
            }

            if let Some(hook) = &hooks.on_progress {
                hook(job.progress.percent());
            }

            let processed = index + 1;
            if processed % batch_size == 0 && processed < total && !pause.is_zero() {
                debug!(job_id, processed, pause_ms = pause.as_millis() as u64, "Pausing between batches");
                tokio::time::sleep(pause).await;
            }
        }

        let lifecycle = self.lifecycle.lock().await;

        if job.status == JobStatus::Running {
            job.status = JobStatus::Completed;
            if let Err(e) = self.record_auto_decisions(&job).await {
                return Err(self.fail_job(&mut job, e).await);
            }
        }
        job.completed_at = Some(Utc::now());

        if let Err(e) = self.save_job(&job).await {
            return Err(self.fail_job(&mut job, e).await);
        }
        self.cancellations.release(job_id);
        drop(run);
        drop(lifecycle);

        let summary = BatchSummary::from_job(&job, started.elapsed());
        info!(
            job_id,
            status = %job.status,
            processed = summary.processed_records,
            auto_matched = summary.auto_matched,
            manual_review = summary.manual_review,
            errors = summary.errors,
            duration_ms = summary.duration_ms,
            "Batch job finished"
        );

        if let Some(hook) = &hooks.on_complete {
            hook(&summary);
        }

        Ok(summary)
    }

    async fn record_auto_decisions(&self, job: &BatchMatchJob) -> Result<(), BatchError> {
        for result in &job.results {
            if result.status != RecordMatchStatus::AutoMatched {
                continue;
            }
            if let Some(best) = result.best_match() {
                let decision = MatchResult::confirmed(&result.source_record_id, best, AUTO_MATCHER)
                    .with_notes(format!("batch job {}", job.id));
                self.decisions.append(decision).await?;
            }
        }
        Ok(())
    }

    /// End a live run with a job error
    async fn fail_run(&self, job: &mut BatchMatchJob, error: BatchError, run: ActiveRun<'_>) -> BatchError {
        let _lifecycle = self.lifecycle.lock().await;
        let error = self.fail_job(job, error).await;
        drop(run);
        error
    }

    /// Mark a job as failed, persist it if possible and hand the error back.
    /// Callers hold the lifecycle lock.
    async fn fail_job(&self, job: &mut BatchMatchJob, error: BatchError) -> BatchError {
        warn!(job_id = %job.id, error = %error, "Batch job failed");

        job.status = JobStatus::Error;
        job.completed_at = Some(Utc::now());
        job.errors.push(BatchMatchError::job(error.to_string()));

        if let Err(save_error) = self.save_job(job).await {
            warn!(job_id = %job.id, error = %save_error, "Failed to persist failed batch job");
        }
        self.cancellations.release(&job.id);

        error
    }
}

impl std::fmt::Debug for BatchMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchMatcher")
            .field("backend", &self.store.backend_name())
            .field("active_runs", &self.active.lock().len())
            .field("active_tokens", &self.cancellations.len())
            .finish()
    }
}

/// Rank and classify one source record, isolating failures
fn process_record(
    ranker: &Ranker<'_>,
    source: &Record,
    targets: &[Record],
    config: &BatchMatchConfig,
) -> BatchMatchResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| evaluate_record(ranker, source, targets, config)));

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => BatchMatchResult::failed(source.id.clone(), e.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "record processing panicked".to_string());
            BatchMatchResult::failed(source.id.clone(), message)
        }
    }
}

fn evaluate_record(
    ranker: &Ranker<'_>,
    source: &Record,
    targets: &[Record],
    config: &BatchMatchConfig,
) -> Result<BatchMatchResult, MatchingError> {
    if source.id.trim().is_empty() {
        return Err(MatchingError::InvalidRecord("source record has no id".to_string()));
    }

    let mut matches = ranker.rank(source, targets);
    let status = classify(&matches, config);
    matches.truncate(config.max_matches_per_record);

    let confidence = matches.first().map(|c| c.score).unwrap_or(0);
    let matched_record_id = (status == RecordMatchStatus::AutoMatched)
        .then(|| matches.first().map(|c| c.record.id.clone()))
        .flatten();

    debug!(
        record_id = %source.id,
        candidates = matches.len(),
        confidence,
        status = ?status,
        "Record classified"
    );

    Ok(BatchMatchResult {
        source_record_id: source.id.clone(),
        status,
        matches,
        confidence,
        matched_record_id,
        error: None,
        processed_at: Utc::now(),
    })
}
