//! Skeleton overlay description.
//!
//! Produces the points and segments a renderer should draw on top of the
//! frame for one pose. Drawing itself is left to the caller.

use crate::pose::{AnalysisResult, KeypointName, Pose};
use serde::{Deserialize, Serialize};

/// Keypoints at or below this score are not drawn.
pub const MIN_DRAW_SCORE: f32 = 0.3;

/// Skeleton segments drawn between visible keypoints.
pub const SKELETON_CONNECTIONS: [(KeypointName, KeypointName); 10] = [
    (KeypointName::Nose, KeypointName::LeftShoulder),
    (KeypointName::Nose, KeypointName::RightShoulder),
    (KeypointName::LeftShoulder, KeypointName::RightShoulder),
    (KeypointName::LeftShoulder, KeypointName::LeftHip),
    (KeypointName::RightShoulder, KeypointName::RightHip),
    (KeypointName::LeftHip, KeypointName::RightHip),
    (KeypointName::LeftHip, KeypointName::LeftKnee),
    (KeypointName::RightHip, KeypointName::RightKnee),
    (KeypointName::LeftKnee, KeypointName::LeftAnkle),
    (KeypointName::RightKnee, KeypointName::RightAnkle),
];

/// Overlay tint, chosen from the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayColor {
    Affirmative,
    Warning,
}

impl OverlayColor {
    pub fn for_result(result: &AnalysisResult) -> Self {
        if result.is_good_posture {
            OverlayColor::Affirmative
        } else {
            OverlayColor::Warning
        }
    }

    /// CSS hex color.
    pub fn hex(self) -> &'static str {
        match self {
            OverlayColor::Affirmative => "#10B981",
            OverlayColor::Warning => "#EF4444",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub name: KeypointName,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySegment {
    pub from: OverlayPoint,
    pub to: OverlayPoint,
}

/// Everything needed to draw one pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayScene {
    pub color: OverlayColor,
    pub points: Vec<OverlayPoint>,
    pub segments: Vec<OverlaySegment>,
}

impl OverlayScene {
    /// Build the overlay for `pose`, tinted by `result`.
    pub fn build(pose: &Pose, result: &AnalysisResult) -> Self {
        let visible = |name: KeypointName| {
            pose.get(name)
                .filter(|kp| kp.is_visible(MIN_DRAW_SCORE))
                .map(|kp| OverlayPoint {
                    name,
                    x: kp.x,
                    y: kp.y,
                })
        };

        let points = KeypointName::ALL.iter().filter_map(|&n| visible(n)).collect();

        let segments = SKELETON_CONNECTIONS
            .iter()
            .filter_map(|&(a, b)| Some(OverlaySegment {
                from: visible(a)?,
                to: visible(b)?,
            }))
            .collect();

        Self {
            color: OverlayColor::for_result(result),
            points,
            segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::PostureIssue;
    use chrono::Utc;
    use KeypointName::*;

    #[test]
    fn test_low_score_points_are_hidden() {
        let pose = Pose::new()
            .with(Nose, 1.0, 1.0, 0.9)
            .with(LeftShoulder, 2.0, 2.0, 0.3)
            .with(RightShoulder, 3.0, 3.0, 0.8);
        let result = AnalysisResult::new(Vec::new(), 0.9, Utc::now());
        let scene = OverlayScene::build(&pose, &result);

        assert_eq!(scene.points.len(), 2);
        assert_eq!(scene.segments.len(), 1);
        assert_eq!(scene.segments[0].from.name, Nose);
        assert_eq!(scene.segments[0].to.name, RightShoulder);
    }

    #[test]
    fn test_color_tracks_verdict() {
        let good = AnalysisResult::new(Vec::new(), 0.9, Utc::now());
        let bad = AnalysisResult::new(vec![PostureIssue::Slouching], 0.9, Utc::now());
        assert_eq!(OverlayColor::for_result(&good).hex(), "#10B981");
        assert_eq!(OverlayColor::for_result(&bad).hex(), "#EF4444");
    }
}
