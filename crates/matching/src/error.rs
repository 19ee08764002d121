//! Matching error types

use thiserror::Error;

/// Errors that can occur while configuring or running a match
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
