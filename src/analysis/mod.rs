//! Periodic pose estimation and classification.
//!
//! The [`AnalysisLoop`] samples a frame source on a fixed period, runs at most
//! one [`PoseEstimator`] call at a time, and broadcasts classified results.

pub mod analysis_loop;
pub mod clock;
pub mod estimator;
pub mod stats;

// Re-export commonly used types
pub use analysis_loop::{
    AnalysisLoop, AnalysisLoopState, LoopError, DEFAULT_CHANNEL_CAPACITY, DEFAULT_SAMPLE_INTERVAL,
};
pub use clock::SessionClock;
pub use estimator::{
    parse_pose_lines, EstimationError, InitializationError, PoseEstimator, ReplayEstimator,
};
pub use stats::{create_shared_stats, LoopStats, LoopStatsSnapshot, SharedLoopStats};
