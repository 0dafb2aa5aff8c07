//! Pose data types exchanged between the estimator and the rule engine.
//!
//! Coordinates are kept in the estimator's native pixel space; nothing in
//! this module normalizes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of joints produced by a single-person COCO estimator.
pub const KEYPOINT_COUNT: usize = 17;

/// The 17 COCO body joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointName {
    /// All joints in estimator output order.
    pub const ALL: [KeypointName; KEYPOINT_COUNT] = [
        KeypointName::Nose,
        KeypointName::LeftEye,
        KeypointName::RightEye,
        KeypointName::LeftEar,
        KeypointName::RightEar,
        KeypointName::LeftShoulder,
        KeypointName::RightShoulder,
        KeypointName::LeftElbow,
        KeypointName::RightElbow,
        KeypointName::LeftWrist,
        KeypointName::RightWrist,
        KeypointName::LeftHip,
        KeypointName::RightHip,
        KeypointName::LeftKnee,
        KeypointName::RightKnee,
        KeypointName::LeftAnkle,
        KeypointName::RightAnkle,
    ];

    /// Slot of this joint inside a [`Pose`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The snake_case identifier used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            KeypointName::Nose => "nose",
            KeypointName::LeftEye => "left_eye",
            KeypointName::RightEye => "right_eye",
            KeypointName::LeftEar => "left_ear",
            KeypointName::RightEar => "right_ear",
            KeypointName::LeftShoulder => "left_shoulder",
            KeypointName::RightShoulder => "right_shoulder",
            KeypointName::LeftElbow => "left_elbow",
            KeypointName::RightElbow => "right_elbow",
            KeypointName::LeftWrist => "left_wrist",
            KeypointName::RightWrist => "right_wrist",
            KeypointName::LeftHip => "left_hip",
            KeypointName::RightHip => "right_hip",
            KeypointName::LeftKnee => "left_knee",
            KeypointName::RightKnee => "right_knee",
            KeypointName::LeftAnkle => "left_ankle",
            KeypointName::RightAnkle => "right_ankle",
        }
    }
}

impl std::fmt::Display for KeypointName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single joint estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: KeypointName,
    pub x: f32,
    pub y: f32,
    /// Estimator confidence that the position is correct (0-1)
    pub score: f32,
}

impl Keypoint {
    pub fn new(name: KeypointName, x: f32, y: f32, score: f32) -> Self {
        Self { name, x, y, score }
    }

    /// Whether the score clears `threshold` (strictly greater).
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.score > threshold
    }
}

/// Errors raised while assembling a pose.
#[derive(Debug, Clone, PartialEq)]
pub enum PoseError {
    DuplicateKeypoint(KeypointName),
}

impl std::fmt::Display for PoseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoseError::DuplicateKeypoint(name) => {
                write!(f, "Keypoint '{name}' appears more than once in a pose")
            }
        }
    }
}

impl std::error::Error for PoseError {}

/// One detected person: at most one keypoint per joint.
///
/// Keypoints live in a fixed array indexed by [`KeypointName`], so lookups
/// can't miss on a misspelled key. On the wire a pose is a plain list of
/// keypoints.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keypoint>", into = "Vec<Keypoint>")]
pub struct Pose {
    keypoints: [Option<Keypoint>; KEYPOINT_COUNT],
}

impl Pose {
    /// Create an empty pose.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pose from keypoints, rejecting duplicate joints.
    pub fn from_keypoints<I>(keypoints: I) -> Result<Self, PoseError>
    where
        I: IntoIterator<Item = Keypoint>,
    {
        let mut pose = Self::new();
        for keypoint in keypoints {
            let slot = &mut pose.keypoints[keypoint.name.index()];
            if slot.is_some() {
                return Err(PoseError::DuplicateKeypoint(keypoint.name));
            }
            *slot = Some(keypoint);
        }
        Ok(pose)
    }

    /// Builder-style insert; replaces any existing keypoint for that joint.
    pub fn with(mut self, name: KeypointName, x: f32, y: f32, score: f32) -> Self {
        self.insert(Keypoint::new(name, x, y, score));
        self
    }

    /// Insert or replace the keypoint for its joint.
    pub fn insert(&mut self, keypoint: Keypoint) {
        self.keypoints[keypoint.name.index()] = Some(keypoint);
    }

    pub fn get(&self, name: KeypointName) -> Option<&Keypoint> {
        self.keypoints[name.index()].as_ref()
    }

    /// Iterate present keypoints in joint order.
    pub fn keypoints(&self) -> impl Iterator<Item = &Keypoint> {
        self.keypoints.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.keypoints().count()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.iter().all(Option::is_none)
    }
}

impl TryFrom<Vec<Keypoint>> for Pose {
    type Error = PoseError;

    fn try_from(keypoints: Vec<Keypoint>) -> Result<Self, Self::Error> {
        Pose::from_keypoints(keypoints)
    }
}

impl From<Pose> for Vec<Keypoint> {
    fn from(pose: Pose) -> Self {
        pose.keypoints().copied().collect()
    }
}

/// Issue codes emitted by the rule engine.
///
/// The serialized form is the exact human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostureIssue {
    #[serde(rename = "No person detected")]
    NoPersonDetected,
    #[serde(rename = "Insufficient pose visibility")]
    InsufficientVisibility,
    #[serde(rename = "Head forward posture detected")]
    HeadForward,
    #[serde(rename = "Uneven shoulders detected")]
    UnevenShoulders,
    #[serde(rename = "Slouching detected - sit up straight")]
    Slouching,
    #[serde(rename = "Knee going over toe - adjust squat form")]
    KneeOverToe,
    #[serde(rename = "Poor hip-knee alignment")]
    HipKneeMisalignment,
}

impl PostureIssue {
    pub fn as_str(self) -> &'static str {
        match self {
            PostureIssue::NoPersonDetected => "No person detected",
            PostureIssue::InsufficientVisibility => "Insufficient pose visibility",
            PostureIssue::HeadForward => "Head forward posture detected",
            PostureIssue::UnevenShoulders => "Uneven shoulders detected",
            PostureIssue::Slouching => "Slouching detected - sit up straight",
            PostureIssue::KneeOverToe => "Knee going over toe - adjust squat form",
            PostureIssue::HipKneeMisalignment => "Poor hip-knee alignment",
        }
    }
}

impl std::fmt::Display for PostureIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict produced for one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// True exactly when `issues` is empty
    pub is_good_posture: bool,
    /// Issues in rule evaluation order
    pub issues: Vec<PostureIssue>,
    /// Mean score of the visible gating keypoints (0-1)
    pub confidence: f32,
    /// When the analysis was produced
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    /// Build a result from the issues found; goodness is derived, never passed in.
    pub fn new(issues: Vec<PostureIssue>, confidence: f32, timestamp: DateTime<Utc>) -> Self {
        Self {
            is_good_posture: issues.is_empty(),
            issues,
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            timestamp,
        }
    }

    /// A result carrying a single non-analyzable issue with zero confidence.
    pub fn unanalyzable(issue: PostureIssue, timestamp: DateTime<Utc>) -> Self {
        Self::new(vec![issue], 0.0, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_name_indices_match_order() {
        for (i, name) in KeypointName::ALL.iter().enumerate() {
            assert_eq!(name.index(), i);
        }
    }

    #[test]
    fn test_pose_rejects_duplicate_joint() {
        let result = Pose::from_keypoints(vec![
            Keypoint::new(KeypointName::Nose, 1.0, 2.0, 0.9),
            Keypoint::new(KeypointName::Nose, 3.0, 4.0, 0.8),
        ]);
        assert_eq!(result, Err(PoseError::DuplicateKeypoint(KeypointName::Nose)));
    }

    #[test]
    fn test_pose_lookup() {
        let pose = Pose::new().with(KeypointName::LeftHip, 10.0, 20.0, 0.7);
        assert_eq!(pose.get(KeypointName::LeftHip).map(|k| k.x), Some(10.0));
        assert!(pose.get(KeypointName::RightHip).is_none());
        assert_eq!(pose.len(), 1);
    }

    #[test]
    fn test_pose_json_shape() {
        let json = r#"[{"name":"nose","x":300.0,"y":90.0,"score":0.9},
                       {"name":"left_shoulder","x":200.0,"y":100.0,"score":0.8}]"#;
        let pose: Pose = serde_json::from_str(json).unwrap();
        assert_eq!(pose.len(), 2);
        assert_eq!(pose.get(KeypointName::LeftShoulder).unwrap().score, 0.8);

        let duplicate = r#"[{"name":"nose","x":1.0,"y":1.0,"score":0.9},
                            {"name":"nose","x":2.0,"y":2.0,"score":0.9}]"#;
        assert!(serde_json::from_str::<Pose>(duplicate).is_err());
    }

    #[test]
    fn test_issue_serializes_as_message() {
        let json = serde_json::to_string(&PostureIssue::Slouching).unwrap();
        assert_eq!(json, "\"Slouching detected - sit up straight\"");
    }

    #[test]
    fn test_result_goodness_follows_issues() {
        let good = AnalysisResult::new(Vec::new(), 0.8, Utc::now());
        assert!(good.is_good_posture);

        let bad = AnalysisResult::new(vec![PostureIssue::HeadForward], 1.4, Utc::now());
        assert!(!bad.is_good_posture);
        assert_eq!(bad.confidence, 1.0);
    }
}
