//! Cooperative job cancellation
//!
//! A running job checks its token before every record. Tokens are shared
//! per job id, so a token handed out before the run starts cancels it too.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation token for cooperative cancellation
#[derive(Clone)]
pub struct CancellationToken {
    id: String,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Get the token ID
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Tokens by job id
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a job, created on first use
    pub fn token(&self, job_id: &str) -> CancellationToken {
        self.tokens
            .lock()
            .entry(job_id.to_string())
            .or_insert_with(|| CancellationToken::new(job_id))
            .clone()
    }

    /// Cancel a job's token
    pub fn cancel(&self, job_id: &str) {
        self.token(job_id).cancel();
    }

    /// Forget a job's token once it has stopped
    pub fn release(&self, job_id: &str) {
        self.tokens.lock().remove(job_id);
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}
