//! Batch error types

use record_linkage_matching::MatchingError;
use thiserror::Error;

use crate::types::JobStatus;

/// Errors raised by a [`JobStore`](crate::store::JobStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if error is transient and operation can be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

/// Errors returned by the batch matcher
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch job not found: {0}")]
    JobNotFound(String),

    #[error("Batch job {job_id} is {status}")]
    InvalidState { job_id: String, status: JobStatus },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Records of batch job {0} are missing from the store")]
    MissingRecords(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Matching error: {0}")]
    Matching(#[from] MatchingError),
}
