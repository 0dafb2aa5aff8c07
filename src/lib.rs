//! PostureAI Agent - Real-time posture analysis from a camera or video file.
//!
//! This library samples frames from a video origin, runs a pose estimator on
//! them at a fixed period, and classifies the detected pose with geometric
//! rules for desk and squat posture.
//!
//! # Pipeline Guarantees
//!
//! - **One origin**: a session holds exactly one camera or file handle
//! - **One estimation at a time**: ticks that arrive while the estimator is
//!   busy are dropped, never queued
//! - **Clean stop**: nothing is emitted after the loop is stopped
//! - **Local only**: frames and poses never leave the process
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PostureAI Session                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ FrameSource │──▶│  Analysis   │──▶│  Posture    │       │
//! │  │(camera/file)│   │ Loop (100ms)│   │ Classifier  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         ▲                 │                  │              │
//! │         │                 ▼                  ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Overlay   │◀──│    Pose     │   │  History /  │       │
//! │  │    Scene    │   │  Estimator  │   │   Status    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use postureai_agent::{Config, FrameOrigin, ReplayEstimator, Session, SyntheticBackend};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let estimator = ReplayEstimator::from_path("poses.jsonl")
//!     .map(|e| Arc::new(e) as Arc<dyn postureai_agent::PoseEstimator>);
//! let mut session = Session::new(&config, Box::new(SyntheticBackend::new()), estimator);
//!
//! session.switch_origin(FrameOrigin::Camera(config.camera))?;
//! session.start_analysis()?;
//!
//! tokio::time::sleep(Duration::from_secs(1)).await;
//! session.sync_results();
//! println!("{}", session.status());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod core;
pub mod pose;
pub mod session;
pub mod source;

// Re-export key types at crate root for convenience
pub use analysis::{
    AnalysisLoop, AnalysisLoopState, EstimationError, InitializationError, LoopError, LoopStats,
    LoopStatsSnapshot, PoseEstimator, ReplayEstimator,
};
pub use config::{Config, ConfigError};
pub use crate::core::{
    AnalysisHistory, HistoryStats, OverlayScene, PostureClassifier, RuleThresholds, Trend,
};
pub use pose::{AnalysisResult, Keypoint, KeypointName, Pose, PostureIssue};
pub use session::{PostureStatus, Session, SessionError};
pub use source::{
    CameraConstraints, DeviceAccessError, FrameOrigin, FrameSource, FrameSourceState,
    SourceError, SyntheticBackend, VideoBackend, VideoBlob,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Posture guidelines that can be displayed to users.
pub const POSTURE_GUIDE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 POSTUREAI - POSTURE GUIDELINES                   ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  DESK POSTURE                                                    ║
║  ✓ Good posture:                                                 ║
║    • Head aligned over shoulders                                 ║
║    • Shoulders relaxed and even                                  ║
║    • Back straight against chair                                 ║
║    • Feet flat on floor                                          ║
║    • Arms at 90-degree angle                                     ║
║  ✗ Common issues we detect:                                      ║
║    • Head forward posture                                        ║
║    • Slouching or hunched back                                   ║
║    • Uneven shoulders                                            ║
║                                                                  ║
║  SQUAT FORM                                                      ║
║  ✓ Proper form:                                                  ║
║    • Knees track over toes                                       ║
║    • Hip-width stance                                            ║
║    • Chest up, back straight                                     ║
║    • Weight on heels                                             ║
║  ✗ Common issues we detect:                                      ║
║    • Knees going over toes                                       ║
║    • Poor hip-knee alignment                                     ║
║                                                                  ║
║  HOW DETECTION WORKS                                             ║
║    • 17 body keypoints are located in every sampled frame        ║
║    • Distances between joints are checked against fixed rules    ║
║    • Analysis runs about ten times per second                    ║
║                                                                  ║
║  TIPS FOR BETTER RESULTS                                         ║
║    • Position the camera at chest level                          ║
║    • Keep your full torso in frame                               ║
║    • Use good lighting and avoid busy backgrounds                ║
║    • Stay still for accurate readings                            ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posture_guide_contents() {
        assert!(POSTURE_GUIDE.contains("DESK POSTURE"));
        assert!(POSTURE_GUIDE.contains("SQUAT FORM"));
        assert!(POSTURE_GUIDE.contains("Head forward posture"));
        assert!(POSTURE_GUIDE.contains("Poor hip-knee alignment"));
    }
}
