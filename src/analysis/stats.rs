//! Counters describing what the analysis loop has done.
//!
//! Shared between the ticker and in-flight estimations, so every counter is
//! an atomic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tick and estimation counters for one session.
#[derive(Debug)]
pub struct LoopStats {
    /// Timer ticks observed
    ticks: AtomicU64,
    /// Ticks dropped because an estimation was in flight
    skipped_busy: AtomicU64,
    /// Ticks dropped because no frame was available
    skipped_no_frame: AtomicU64,
    /// Estimator invocations
    estimations_started: AtomicU64,
    /// Estimator invocations that returned, successfully or not
    estimations_completed: AtomicU64,
    /// Estimator invocations that returned an error
    estimation_failures: AtomicU64,
    /// Completions dropped because the loop was stopped
    results_discarded: AtomicU64,
    /// Results delivered to consumers
    results_emitted: AtomicU64,
    session_start: DateTime<Utc>,
}

impl LoopStats {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            skipped_busy: AtomicU64::new(0),
            skipped_no_frame: AtomicU64::new(0),
            estimations_started: AtomicU64::new(0),
            estimations_completed: AtomicU64::new(0),
            estimation_failures: AtomicU64::new(0),
            results_discarded: AtomicU64::new(0),
            results_emitted: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_busy(&self) {
        self.skipped_busy.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_no_frame(&self) {
        self.skipped_no_frame.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_estimation_started(&self) {
        self.estimations_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_estimation_completed(&self) {
        self.estimations_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_estimation_failure(&self) {
        self.estimation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result_discarded(&self) {
        self.results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result_emitted(&self) {
        self.results_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped_busy: self.skipped_busy.load(Ordering::Relaxed),
            skipped_no_frame: self.skipped_no_frame.load(Ordering::Relaxed),
            estimations_started: self.estimations_started.load(Ordering::SeqCst),
            estimations_completed: self.estimations_completed.load(Ordering::SeqCst),
            estimation_failures: self.estimation_failures.load(Ordering::Relaxed),
            results_discarded: self.results_discarded.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Loop Statistics:\n\
             - Ticks: {}\n\
             - Skipped (estimation in flight): {}\n\
             - Skipped (no frame): {}\n\
             - Estimations: {} started, {} completed, {} failed\n\
             - Results: {} emitted, {} discarded\n\
             - Session duration: {} seconds",
            stats.ticks,
            stats.skipped_busy,
            stats.skipped_no_frame,
            stats.estimations_started,
            stats.estimations_completed,
            stats.estimation_failures,
            stats.results_emitted,
            stats.results_discarded,
            stats.session_duration_secs
        )
    }
}

impl Default for LoopStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of loop statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopStatsSnapshot {
    pub ticks: u64,
    pub skipped_busy: u64,
    pub skipped_no_frame: u64,
    pub estimations_started: u64,
    pub estimations_completed: u64,
    pub estimation_failures: u64,
    pub results_discarded: u64,
    pub results_emitted: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl LoopStatsSnapshot {
    /// Estimations started but not yet returned.
    pub fn in_flight(&self) -> u64 {
        self.estimations_started
            .saturating_sub(self.estimations_completed)
    }
}

/// Thread-safe shared loop statistics.
pub type SharedLoopStats = Arc<LoopStats>;

/// Create a new shared statistics block.
pub fn create_shared_stats() -> SharedLoopStats {
    Arc::new(LoopStats::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = LoopStats::new();

        stats.record_tick();
        stats.record_tick();
        stats.record_skipped_busy();
        stats.record_estimation_started();

        let snapshot = stats.stats();
        assert_eq!(snapshot.ticks, 2);
        assert_eq!(snapshot.skipped_busy, 1);
        assert_eq!(snapshot.in_flight(), 1);

        stats.record_estimation_completed();
        assert_eq!(stats.stats().in_flight(), 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = LoopStats::new().summary();
        assert!(summary.contains("Ticks"));
        assert!(summary.contains("emitted"));
    }
}
