//! Append-only log of analysis results with aggregate statistics.
//!
//! The history lives for one session only; nothing is written to disk.

use crate::pose::{AnalysisResult, PostureIssue};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;

/// Success rate (percent) at or above which the trend reads as improving.
pub const IMPROVING_SUCCESS_RATE: f64 = 70.0;

/// Direction of the session so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Declining,
}

/// How often one issue has been reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCount {
    pub issue: PostureIssue,
    pub count: usize,
}

/// Aggregated view of the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total: usize,
    pub good_count: usize,
    /// Percentage of good results (0-100)
    pub success_rate: f64,
    pub mean_confidence: f64,
    pub trend: Option<Trend>,
    pub common_issues: Vec<IssueCount>,
}

/// Append-only analysis log.
#[derive(Debug, Clone, Default)]
pub struct AnalysisHistory {
    entries: Vec<AnalysisResult>,
    /// Oldest entries are dropped beyond this many
    capacity: Option<usize>,
}

impl AnalysisHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history that keeps at most `capacity` entries.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn record(&mut self, result: AnalysisResult) {
        self.entries.push(result);
        if let Some(cap) = self.capacity {
            if self.entries.len() > cap {
                let excess = self.entries.len() - cap;
                self.entries.drain(..excess);
            }
        }
    }

    pub fn entries(&self) -> &[AnalysisResult] {
        &self.entries
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn good_count(&self) -> usize {
        self.entries.iter().filter(|r| r.is_good_posture).count()
    }

    /// Percentage of good results; 0 for an empty history.
    pub fn success_rate(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.good_count() as f64 / self.entries.len() as f64 * 100.0
    }

    pub fn trend(&self) -> Option<Trend> {
        if self.entries.is_empty() {
            None
        } else if self.success_rate() >= IMPROVING_SUCCESS_RATE {
            Some(Trend::Improving)
        } else {
            Some(Trend::Declining)
        }
    }

    pub fn mean_confidence(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let confidences: Vec<f64> = self.entries.iter().map(|r| r.confidence as f64).collect();
        confidences.iter().mean()
    }

    /// Newest-first slice of the last `n` results.
    pub fn recent(&self, n: usize) -> Vec<&AnalysisResult> {
        self.entries.iter().rev().take(n).collect()
    }

    /// Number of good results among the last `n`.
    pub fn recent_good(&self, n: usize) -> usize {
        self.entries
            .iter()
            .rev()
            .take(n)
            .filter(|r| r.is_good_posture)
            .count()
    }

    /// The `limit` most frequent issues, most frequent first. Ties keep the
    /// order in which the issues first appeared.
    pub fn most_common_issues(&self, limit: usize) -> Vec<IssueCount> {
        let mut first_seen: Vec<PostureIssue> = Vec::new();
        let mut counts: HashMap<PostureIssue, usize> = HashMap::new();

        for issue in self.entries.iter().flat_map(|r| r.issues.iter().copied()) {
            let count = counts.entry(issue).or_insert(0);
            if *count == 0 {
                first_seen.push(issue);
            }
            *count += 1;
        }

        let mut ranked: Vec<IssueCount> = first_seen
            .into_iter()
            .map(|issue| IssueCount {
                issue,
                count: counts[&issue],
            })
            .collect();
        // Stable sort keeps first-appearance order for equal counts.
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(limit);
        ranked
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total: self.total(),
            good_count: self.good_count(),
            success_rate: self.success_rate(),
            mean_confidence: self.mean_confidence(),
            trend: self.trend(),
            common_issues: self.most_common_issues(5),
        }
    }

    /// Summary string for display.
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "No analysis history yet.".to_string();
        }

        let stats = self.stats();
        let mut out = format!(
            "Analysis Summary:\n\
             - Total analyses: {}\n\
             - Good posture: {}\n\
             - Success rate: {:.1}%\n\
             - Recent good posture: {}/5\n\
             - Mean confidence: {:.1}%",
            stats.total,
            stats.good_count,
            stats.success_rate,
            self.recent_good(5),
            stats.mean_confidence * 100.0,
        );

        if !stats.common_issues.is_empty() {
            out.push_str("\n\nMost Common Issues:");
            for entry in &stats.common_issues {
                out.push_str(&format!("\n- {}: {} times", entry.issue, entry.count));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(issues: Vec<PostureIssue>, confidence: f32) -> AnalysisResult {
        AnalysisResult::new(issues, confidence, Utc::now())
    }

    #[test]
    fn test_empty_history() {
        let history = AnalysisHistory::new();
        assert_eq!(history.success_rate(), 0.0);
        assert_eq!(history.trend(), None);
        assert_eq!(history.mean_confidence(), 0.0);
        assert!(history.summary().contains("No analysis history"));
    }

    #[test]
    fn test_success_rate_and_trend() {
        let mut history = AnalysisHistory::new();
        for _ in 0..7 {
            history.record(result(Vec::new(), 0.9));
        }
        for _ in 0..3 {
            history.record(result(vec![PostureIssue::Slouching], 0.5));
        }

        assert_eq!(history.total(), 10);
        assert_eq!(history.good_count(), 7);
        assert!((history.success_rate() - 70.0).abs() < 1e-9);
        assert_eq!(history.trend(), Some(Trend::Improving));
        assert_eq!(history.recent_good(5), 2);
        assert!((history.mean_confidence() - 0.78).abs() < 1e-6);
    }

    #[test]
    fn test_most_common_issues_ordering() {
        let mut history = AnalysisHistory::new();
        history.record(result(vec![PostureIssue::HeadForward], 0.8));
        history.record(result(
            vec![PostureIssue::UnevenShoulders, PostureIssue::Slouching],
            0.8,
        ));
        history.record(result(vec![PostureIssue::Slouching], 0.8));

        let common = history.most_common_issues(5);
        assert_eq!(common[0].issue, PostureIssue::Slouching);
        assert_eq!(common[0].count, 2);
        assert_eq!(common[1].issue, PostureIssue::HeadForward);
        assert_eq!(common[2].issue, PostureIssue::UnevenShoulders);

        assert_eq!(history.most_common_issues(1).len(), 1);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut history = AnalysisHistory::new();
        history.record(result(Vec::new(), 0.1));
        history.record(result(Vec::new(), 0.2));
        history.record(result(Vec::new(), 0.3));

        let recent = history.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].confidence, 0.3);
        assert_eq!(recent[1].confidence, 0.2);
    }

    #[test]
    fn test_capacity_limit_drops_oldest() {
        let mut history = AnalysisHistory::with_capacity_limit(2);
        history.record(result(Vec::new(), 0.1));
        history.record(result(Vec::new(), 0.2));
        history.record(result(Vec::new(), 0.3));
        assert_eq!(history.total(), 2);
        assert_eq!(history.entries()[0].confidence, 0.2);
    }
}
