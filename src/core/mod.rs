//! Core functionality for the PostureAI agent.
//!
//! This module contains:
//! - The rule-based posture classifier
//! - Overlay scene building for the skeleton renderer
//! - The per-session analysis history

pub mod classifier;
pub mod history;
pub mod overlay;

// Re-export commonly used types
pub use classifier::{PostureClassifier, RuleThresholds, GATING_SET, MIN_VISIBLE_GATING};
pub use history::{AnalysisHistory, HistoryStats, IssueCount, Trend};
pub use overlay::{OverlayColor, OverlayPoint, OverlayScene, OverlaySegment, SKELETON_CONNECTIONS};
