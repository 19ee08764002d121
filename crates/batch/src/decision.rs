//! Match decisions
//!
//! A [`MatchResult`] is never edited. Corrections append a new result to the
//! source record's history in the [`DecisionLog`]; the latest entry wins.

use chrono::{DateTime, Utc};
use record_linkage_matching::CandidateMatch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::JobStore;

/// `matched_by` of decisions taken by the batch policy
pub const AUTO_MATCHER: &str = "batch:auto";

const KEY_PREFIX: &str = "match-result:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionStatus {
    Matched,
    Rejected,
    ManualReview,
}

/// A match decision for one source record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: String,
    pub source_id: String,
    pub match_id: Option<String>,
    pub status: DecisionStatus,
    /// Score backing the decision (0 - 100)
    pub confidence: u8,
    pub matched_by: String,
    pub matched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_scores: Option<BTreeMap<String, u8>>,
}

impl MatchResult {
    fn new(
        source_id: impl Into<String>,
        match_id: Option<String>,
        status: DecisionStatus,
        confidence: u8,
        matched_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            match_id,
            status,
            confidence,
            matched_by: matched_by.into(),
            matched_at: Utc::now(),
            notes: None,
            field_scores: None,
        }
    }

    /// Confirm a candidate as the match
    pub fn confirmed(
        source_id: impl Into<String>,
        candidate: &CandidateMatch,
        matched_by: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(
            source_id,
            Some(candidate.record.id.clone()),
            DecisionStatus::Matched,
            candidate.score,
            matched_by,
        );
        result.field_scores = Some(candidate.field_scores.clone());
        result
    }

    /// Reject a candidate
    pub fn rejected(
        source_id: impl Into<String>,
        candidate: &CandidateMatch,
        matched_by: impl Into<String>,
    ) -> Self {
        Self::new(
            source_id,
            Some(candidate.record.id.clone()),
            DecisionStatus::Rejected,
            candidate.score,
            matched_by,
        )
    }

    /// Send a record to review, optionally with its best candidate
    pub fn for_review(
        source_id: impl Into<String>,
        best: Option<&CandidateMatch>,
        matched_by: impl Into<String>,
    ) -> Self {
        Self::new(
            source_id,
            best.map(|c| c.record.id.clone()),
            DecisionStatus::ManualReview,
            best.map(|c| c.score).unwrap_or(0),
            matched_by,
        )
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Append-only decision history persisted through a [`JobStore`].
///
/// Each source record's history is one store entry, so retention follows
/// the store: a bounded [`MemoryStore`](crate::store::MemoryStore) trims the
/// least recently appended histories. Give the log a store of its own, such
/// as [`MemoryStore::unbounded`](crate::store::MemoryStore::unbounded), to
/// keep every decision.
pub struct DecisionLog {
    store: Arc<dyn JobStore>,
    append_lock: Mutex<()>,
}

impl DecisionLog {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            append_lock: Mutex::new(()),
        }
    }

    fn key(source_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, source_id)
    }

    /// Append a decision to its source record's history
    pub async fn append(&self, result: MatchResult) -> Result<(), StoreError> {
        let _guard = self.append_lock.lock().await;

        let key = Self::key(&result.source_id);
        let mut history = self.load(&key).await?;
        history.push(result);
        self.store.save(&key, serde_json::to_value(&history)?).await
    }

    /// All decisions for a source record, oldest first
    pub async fn history(&self, source_id: &str) -> Result<Vec<MatchResult>, StoreError> {
        self.load(&Self::key(source_id)).await
    }

    /// The decision currently in force for a source record
    pub async fn latest(&self, source_id: &str) -> Result<Option<MatchResult>, StoreError> {
        Ok(self.history(source_id).await?.pop())
    }

    async fn load(&self, key: &str) -> Result<Vec<MatchResult>, StoreError> {
        match self.store.load(key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }
}

impl std::fmt::Debug for DecisionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionLog")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use record_linkage_matching::Record;

    fn candidate(id: &str, score: u8) -> CandidateMatch {
        CandidateMatch {
            record: Record::new(id),
            score,
            matched_on: vec!["Last Name".to_string()],
            field_scores: [("last_name".to_string(), 100)].into_iter().collect(),
        }
    }

    #[test]
    fn test_constructors() {
        let best = candidate("t1", 92);

        let confirmed = MatchResult::confirmed("s1", &best, "reviewer-7");
        assert_eq!(confirmed.status, DecisionStatus::Matched);
        assert_eq!(confirmed.match_id.as_deref(), Some("t1"));
        assert_eq!(confirmed.confidence, 92);
        assert!(confirmed.field_scores.is_some());

        let rejected = MatchResult::rejected("s1", &best, "reviewer-7").with_notes("different mother");
        assert_eq!(rejected.status, DecisionStatus::Rejected);
        assert_eq!(rejected.notes.as_deref(), Some("different mother"));

        let review = MatchResult::for_review("s2", None, AUTO_MATCHER);
        assert_eq!(review.match_id, None);
        assert_eq!(review.confidence, 0);
    }

    #[tokio::test]
    async fn test_corrections_append() {
        let log = DecisionLog::new(Arc::new(MemoryStore::default()));
        let best = candidate("t1", 92);

        log.append(MatchResult::confirmed("s1", &best, AUTO_MATCHER)).await.unwrap();
        log.append(MatchResult::rejected("s1", &best, "reviewer-7")).await.unwrap();

        let history = log.history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, DecisionStatus::Matched);

        let latest = log.latest("s1").await.unwrap().unwrap();
        assert_eq!(latest.status, DecisionStatus::Rejected);
        assert!(log.latest("unknown").await.unwrap().is_none());
    }
}
