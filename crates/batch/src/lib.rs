//! # Record Linkage Batch
//!
//! Batch matching jobs over a source and a target record collection.
//!
//! ## Features
//!
//! - **Batch Matcher**: Job lifecycle with per-record failure isolation
//! - **Acceptance Policy**: Threshold, review-everything and best-match-only strategies
//! - **Progress**: Counters, percentage and estimated completion, persisted after every record
//! - **Cancellation**: Cooperative, per job id
//! - **Job Store**: Async key-value persistence port with a bounded in-memory backend
//! - **Decision Log**: Append-only match decisions
//! - **Summary**: Confidence distribution, field match rates and review queue
//!
//! ## Example
//!
//! ```rust,ignore
//! use record_linkage_batch::{BatchMatchConfig, BatchMatcher, MemoryStore, RunHooks};
//! use record_linkage_matching::{Algorithm, MatchingConfig};
//!
//! let matcher = BatchMatcher::new(Arc::new(MemoryStore::default()));
//! let job = matcher.create_batch_job(sources, targets, BatchMatchConfig::default()).await?;
//!
//! let hooks = RunHooks::new().on_progress(|percent| println!("{}%", percent));
//! let summary = matcher
//!     .run_batch_job(&job.id, &MatchingConfig::default(), Algorithm::Deterministic, hooks)
//!     .await?;
//! println!("{}", summary);
//! ```

pub mod cancellation;
pub mod decision;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod store;
pub mod summary;
pub mod types;

pub use cancellation::{CancellationRegistry, CancellationToken};
pub use decision::{DecisionLog, DecisionStatus, MatchResult, AUTO_MATCHER};
pub use error::{BatchError, StoreError};
pub use orchestrator::{BatchMatcher, RunHooks};
pub use policy::classify;
pub use store::{JobStore, MemoryStore};
pub use summary::{BatchSummary, ConfidenceDistribution};
pub use types::*;
