//! Ranking metrics
//!
//! Lock-free counters shared between rankers, with an exponential moving
//! average of ranking time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::types::Algorithm;

/// Metrics for candidate ranking
#[derive(Debug, Default)]
pub struct MatchingMetrics {
    /// Rankings performed
    rankings: AtomicU64,
    /// Rankings scored with the weighted-field algorithm
    deterministic_rankings: AtomicU64,
    /// Rankings scored with Fellegi-Sunter
    probabilistic_rankings: AtomicU64,
    /// Rankings that kept no candidate
    empty_rankings: AtomicU64,
    /// Pool records scored
    candidates_scanned: AtomicU64,
    /// Candidates kept after the minimum score filter
    candidates_returned: AtomicU64,
    /// Ranking time in microseconds (exponential moving average)
    ranking_time_ema: AtomicU64,
    /// Peak ranking time in microseconds
    peak_ranking_time: AtomicU64,
}

impl MatchingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one ranking
    pub fn record_ranking(
        &self,
        algorithm: Algorithm,
        scanned: usize,
        returned: usize,
        duration: Duration,
    ) {
        self.rankings.fetch_add(1, Ordering::Relaxed);
        match algorithm {
            Algorithm::Deterministic => self.deterministic_rankings.fetch_add(1, Ordering::Relaxed),
            Algorithm::Probabilistic => self.probabilistic_rankings.fetch_add(1, Ordering::Relaxed),
        };
        if returned == 0 {
            self.empty_rankings.fetch_add(1, Ordering::Relaxed);
        }
        self.candidates_scanned
            .fetch_add(scanned as u64, Ordering::Relaxed);
        self.candidates_returned
            .fetch_add(returned as u64, Ordering::Relaxed);

        // α = 0.3: (3 * current + 7 * previous) / 10
        let duration_us = duration.as_micros() as u64;
        let prev = self.ranking_time_ema.load(Ordering::Relaxed);
        let new_ema = if prev == 0 {
            duration_us
        } else {
            (duration_us * 3 + prev * 7) / 10
        };
        self.ranking_time_ema.store(new_ema, Ordering::Relaxed);

        self.peak_ranking_time
            .fetch_max(duration_us, Ordering::Relaxed);
    }

    /// Share of scanned candidates that were kept (0.0 - 1.0)
    pub fn retention_rate(&self) -> f64 {
        let scanned = self.candidates_scanned.load(Ordering::Relaxed) as f64;
        let returned = self.candidates_returned.load(Ordering::Relaxed) as f64;

        if scanned == 0.0 {
            0.0
        } else {
            returned / scanned
        }
    }

    pub fn avg_ranking_time_ms(&self) -> f64 {
        self.ranking_time_ema.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn peak_ranking_time_ms(&self) -> f64 {
        self.peak_ranking_time.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rankings: self.rankings.load(Ordering::Relaxed),
            deterministic_rankings: self.deterministic_rankings.load(Ordering::Relaxed),
            probabilistic_rankings: self.probabilistic_rankings.load(Ordering::Relaxed),
            empty_rankings: self.empty_rankings.load(Ordering::Relaxed),
            candidates_scanned: self.candidates_scanned.load(Ordering::Relaxed),
            candidates_returned: self.candidates_returned.load(Ordering::Relaxed),
            retention_rate: self.retention_rate(),
            avg_ranking_time_ms: self.avg_ranking_time_ms(),
            peak_ranking_time_ms: self.peak_ranking_time_ms(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.rankings.store(0, Ordering::Relaxed);
        self.deterministic_rankings.store(0, Ordering::Relaxed);
        self.probabilistic_rankings.store(0, Ordering::Relaxed);
        self.empty_rankings.store(0, Ordering::Relaxed);
        self.candidates_scanned.store(0, Ordering::Relaxed);
        self.candidates_returned.store(0, Ordering::Relaxed);
        self.ranking_time_ema.store(0, Ordering::Relaxed);
        self.peak_ranking_time.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub rankings: u64,
    pub deterministic_rankings: u64,
    pub probabilistic_rankings: u64,
    pub empty_rankings: u64,
    pub candidates_scanned: u64,
    pub candidates_returned: u64,
    pub retention_rate: f64,
    pub avg_ranking_time_ms: f64,
    pub peak_ranking_time_ms: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Matching Metrics:")?;
        writeln!(
            f,
            "  Rankings: {} total ({} deterministic, {} probabilistic, {} empty)",
            self.rankings,
            self.deterministic_rankings,
            self.probabilistic_rankings,
            self.empty_rankings
        )?;
        writeln!(
            f,
            "  Candidates: {} scanned, {} returned ({:.1}%)",
            self.candidates_scanned,
            self.candidates_returned,
            self.retention_rate * 100.0
        )?;
        writeln!(
            f,
            "  Performance: {:.2}ms avg, {:.2}ms peak",
            self.avg_ranking_time_ms, self.peak_ranking_time_ms
        )?;
        Ok(())
    }
}
