//! Pose estimator seam and a replaying implementation.
//!
//! The neural model itself is outside this crate. [`ReplayEstimator`] plays
//! back poses recorded as JSON lines (one array of poses per frame), which is
//! enough to drive the pipeline end to end.

use crate::pose::Pose;
use crate::source::Frame;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A transient failure of a single estimation call.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimationError {
    /// The model rejected or could not process the frame
    Inference(String),
}

impl std::fmt::Display for EstimationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimationError::Inference(e) => write!(f, "Pose estimation failed: {e}"),
        }
    }
}

impl std::error::Error for EstimationError {}

/// The estimator could not be loaded. Fatal for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum InitializationError {
    /// Model or track file could not be read
    Io(String),
    /// Model or track contents are invalid
    Invalid(String),
}

impl std::fmt::Display for InitializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitializationError::Io(e) => write!(f, "Failed to load pose estimator: {e}"),
            InitializationError::Invalid(e) => write!(f, "Invalid pose estimator data: {e}"),
        }
    }
}

impl std::error::Error for InitializationError {}

/// Extracts poses from a frame.
///
/// Implementations may return any number of poses; callers only look at the
/// first one.
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    async fn estimate(&self, frame: &Frame) -> Result<Vec<Pose>, EstimationError>;
}

/// Parse JSON lines where each non-empty line is an array of poses.
///
/// Errors carry the 1-based line number.
pub fn parse_pose_lines(content: &str) -> Result<Vec<Vec<Pose>>, (usize, serde_json::Error)> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str::<Vec<Pose>>(line).map_err(|e| (i + 1, e)))
        .collect()
}

/// Replays a recorded pose track, one entry per call, looping at the end.
pub struct ReplayEstimator {
    track: Vec<Vec<Pose>>,
    cursor: AtomicUsize,
    latency: Duration,
}

impl ReplayEstimator {
    /// Build from an in-memory track. An empty track cannot be replayed.
    pub fn new(track: Vec<Vec<Pose>>) -> Result<Self, InitializationError> {
        if track.is_empty() {
            return Err(InitializationError::Invalid(
                "pose track contains no frames".to_string(),
            ));
        }
        Ok(Self {
            track,
            cursor: AtomicUsize::new(0),
            latency: Duration::ZERO,
        })
    }

    /// Load a JSON-lines track from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InitializationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| InitializationError::Io(format!("{path:?}: {e}")))?;
        let track = parse_pose_lines(&content).map_err(|(line, e)| {
            InitializationError::Invalid(format!("{path:?} line {line}: {e}"))
        })?;
        Self::new(track)
    }

    /// Simulated inference time per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }
}

#[async_trait]
impl PoseEstimator for ReplayEstimator {
    async fn estimate(&self, _frame: &Frame) -> Result<Vec<Pose>, EstimationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.track.len();
        Ok(self.track[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::KeypointName;
    use std::sync::Arc;

    fn frame() -> Frame {
        Frame::new(1, 1, 0, Arc::from(vec![0u8; 3]))
    }

    #[test]
    fn test_parse_pose_lines() {
        let content = "[]\n\n[[{\"name\":\"nose\",\"x\":1.0,\"y\":2.0,\"score\":0.5}]]\n";
        let track = parse_pose_lines(content).unwrap();
        assert_eq!(track.len(), 2);
        assert!(track[0].is_empty());
        assert_eq!(track[1][0].get(KeypointName::Nose).unwrap().y, 2.0);
    }

    #[test]
    fn test_parse_reports_line_number() {
        let content = "[]\nnot json\n";
        let (line, _) = parse_pose_lines(content).unwrap_err();
        assert_eq!(line, 2);
    }

    #[test]
    fn test_empty_track_fails_initialization() {
        assert!(matches!(
            ReplayEstimator::new(Vec::new()),
            Err(InitializationError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_track_file_fails_initialization() {
        assert!(matches!(
            ReplayEstimator::from_path("/no/such/track.jsonl"),
            Err(InitializationError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_replay_loops() {
        let pose = Pose::new().with(KeypointName::Nose, 1.0, 1.0, 0.9);
        let estimator = ReplayEstimator::new(vec![Vec::new(), vec![pose]]).unwrap();

        assert!(estimator.estimate(&frame()).await.unwrap().is_empty());
        assert_eq!(estimator.estimate(&frame()).await.unwrap().len(), 1);
        assert!(estimator.estimate(&frame()).await.unwrap().is_empty());
    }
}
