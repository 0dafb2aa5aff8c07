//! Pose data model shared by the estimator, the rule engine and consumers.

pub mod types;

pub use types::{
    AnalysisResult, Keypoint, KeypointName, Pose, PoseError, PostureIssue, KEYPOINT_COUNT,
};
