//! # Record Linkage Matching
//!
//! Script-aware record comparison and candidate ranking for linking person
//! records across two collections.
//!
//! ## Features
//!
//! - **Script Normalizer**: Latin and Ethiopic canonicalization with homophone folding
//! - **Similarity**: Normalized Levenshtein (0 - 100) and Jaro-Winkler (0.0 - 1.0)
//! - **Field Registry**: Per-field comparators (fuzzy, exact, digits, identifiers, dates)
//! - **Deterministic Scorer**: Weighted average over comparable fields
//! - **Probabilistic Scorer**: Fellegi-Sunter log-likelihood weights
//! - **Ranker**: Thresholded, stable, best-first candidate lists
//! - **Adapter**: Records from loosely keyed import rows
//! - **Metrics**: Ranking counters with EMA timings
//!
//! ## Example
//!
//! ```rust
//! use record_linkage_matching::{fields::*, rank, Algorithm, MatchingConfig, Record};
//!
//! let source = Record::new("s1")
//!     .with_field(FIRST_NAME, "John")
//!     .with_field(LAST_NAME, "Smith");
//! let pool = vec![Record::new("t1")
//!     .with_field(FIRST_NAME, "Jon")
//!     .with_field(LAST_NAME, "Smith")];
//!
//! let config = MatchingConfig::default();
//! let candidates = rank(&source, &pool, &config, Algorithm::Deterministic);
//! assert_eq!(candidates[0].record.id, "t1");
//! ```

pub mod adapter;
pub mod comparator;
pub mod config;
pub mod deterministic;
pub mod error;
pub mod metrics;
pub mod probabilistic;
pub mod ranker;
pub mod script;
pub mod similarity;
pub mod types;

pub use adapter::{record_from_json, record_from_pairs};
pub use comparator::{Comparator, FieldRegistry, FieldRule};
pub use config::{MatchingConfig, ProbabilisticConfig, Thresholds};
pub use deterministic::{DeterministicScorer, PARTIAL_QUALIFIER};
pub use error::MatchingError;
pub use metrics::{MatchingMetrics, MetricsSnapshot};
pub use probabilistic::{ProbabilisticScorer, NO_EVIDENCE_SCORE};
pub use ranker::{rank, score, scorer_for, Ranker, Scorer, PRESENTATION_LIMIT};
pub use script::{Language, LanguageConfig, Script, ScriptNormalizer};
pub use types::*;
