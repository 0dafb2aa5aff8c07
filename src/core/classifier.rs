//! Rule-based posture classification.
//!
//! Turns the first detected pose into a verdict using fixed geometric rules.
//! All distances are compared in the estimator's pixel space, so the
//! thresholds implicitly assume the frame size the estimator ran at.

use crate::pose::{AnalysisResult, KeypointName, Pose, PostureIssue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Keypoints that decide whether a pose can be analyzed at all.
pub const GATING_SET: [KeypointName; 5] = [
    KeypointName::Nose,
    KeypointName::LeftShoulder,
    KeypointName::RightShoulder,
    KeypointName::LeftHip,
    KeypointName::RightHip,
];

/// Minimum number of gating keypoints that must be visible.
pub const MIN_VISIBLE_GATING: usize = 4;

/// Pixel thresholds for each rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Gating keypoints must score strictly above this
    pub min_keypoint_score: f32,
    /// Horizontal nose offset from the shoulder center
    pub head_forward_px: f32,
    /// Vertical difference between the shoulders
    pub shoulder_slope_px: f32,
    /// Vertical nose-to-hip-line distance; smaller flags a slouch
    pub slouch_px: f32,
    /// Horizontal knee offset from the ankle
    pub knee_over_toe_px: f32,
    /// Horizontal hip offset from the knee
    pub hip_knee_px: f32,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            min_keypoint_score: 0.3,
            head_forward_px: 50.0,
            shoulder_slope_px: 30.0,
            slouch_px: 200.0,
            knee_over_toe_px: 80.0,
            hip_knee_px: 60.0,
        }
    }
}

/// Stateless posture classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostureClassifier {
    thresholds: RuleThresholds,
}

impl PostureClassifier {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify the detected poses, stamping the result with the current time.
    pub fn classify(&self, poses: &[Pose]) -> AnalysisResult {
        self.classify_at(poses, Utc::now())
    }

    /// Classify the detected poses with an explicit timestamp.
    ///
    /// Only `poses[0]` is considered.
    pub fn classify_at(&self, poses: &[Pose], timestamp: DateTime<Utc>) -> AnalysisResult {
        let Some(pose) = poses.first() else {
            return AnalysisResult::unanalyzable(PostureIssue::NoPersonDetected, timestamp);
        };

        let visible_scores: Vec<f32> = GATING_SET
            .iter()
            .filter_map(|&name| pose.get(name))
            .filter(|kp| kp.is_visible(self.thresholds.min_keypoint_score))
            .map(|kp| kp.score)
            .collect();

        if visible_scores.len() < MIN_VISIBLE_GATING {
            return AnalysisResult::unanalyzable(PostureIssue::InsufficientVisibility, timestamp);
        }

        let confidence = visible_scores.iter().sum::<f32>() / visible_scores.len() as f32;

        AnalysisResult::new(self.evaluate_rules(pose), confidence, timestamp)
    }

    /// Run every rule in order. A rule is skipped when any of its joints are
    /// absent from the pose.
    fn evaluate_rules(&self, pose: &Pose) -> Vec<PostureIssue> {
        use KeypointName::*;

        let t = &self.thresholds;
        let mut issues = Vec::new();

        let nose = pose.get(Nose);
        let left_shoulder = pose.get(LeftShoulder);
        let right_shoulder = pose.get(RightShoulder);
        let left_hip = pose.get(LeftHip);
        let right_hip = pose.get(RightHip);
        let left_knee = pose.get(LeftKnee);
        let right_knee = pose.get(RightKnee);
        let left_ankle = pose.get(LeftAnkle);
        let right_ankle = pose.get(RightAnkle);

        if let (Some(nose), Some(ls), Some(rs)) = (nose, left_shoulder, right_shoulder) {
            let shoulder_center_x = (ls.x + rs.x) / 2.0;
            if (nose.x - shoulder_center_x).abs() > t.head_forward_px {
                issues.push(PostureIssue::HeadForward);
            }
        }

        if let (Some(ls), Some(rs)) = (left_shoulder, right_shoulder) {
            if (ls.y - rs.y).abs() > t.shoulder_slope_px {
                issues.push(PostureIssue::UnevenShoulders);
            }
        }

        // Flags when the nose sits close to the hip line. The direction is
        // kept as shipped; see DESIGN.md.
        if let (Some(nose), Some(lh), Some(rh)) = (nose, left_hip, right_hip) {
            let hip_center_y = (lh.y + rh.y) / 2.0;
            if (nose.y - hip_center_y).abs() < t.slouch_px {
                issues.push(PostureIssue::Slouching);
            }
        }

        if let (Some(lk), Some(rk), Some(la), Some(ra)) =
            (left_knee, right_knee, left_ankle, right_ankle)
        {
            if (lk.x - la.x).abs() > t.knee_over_toe_px || (rk.x - ra.x).abs() > t.knee_over_toe_px
            {
                issues.push(PostureIssue::KneeOverToe);
            }
        }

        if let (Some(lh), Some(rh), Some(lk), Some(rk)) = (left_hip, right_hip, left_knee, right_knee)
        {
            if (lh.x - lk.x).abs() > t.hip_knee_px || (rh.x - rk.x).abs() > t.hip_knee_px {
                issues.push(PostureIssue::HipKneeMisalignment);
            }
        }

        issues
    }
}
