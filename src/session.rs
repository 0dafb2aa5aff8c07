//! A posture analysis session.
//!
//! The session owns the single frame source, the analysis loop driving it,
//! and everything derived from emitted results: the current verdict and the
//! history. Origin switches always tear the old origin down before the new
//! one is acquired.

use crate::analysis::{
    create_shared_stats, AnalysisLoop, AnalysisLoopState, InitializationError, LoopError,
    LoopStatsSnapshot, PoseEstimator, SharedLoopStats,
};
use crate::config::Config;
use crate::core::{AnalysisHistory, OverlayScene, PostureClassifier};
use crate::pose::AnalysisResult;
use crate::source::{
    FrameOrigin, FrameSource, FrameSourceState, SharedFrameSource, SourceError, VideoBackend,
};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Headline verdict shown while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureStatus {
    /// Nothing analyzed yet
    Idle,
    Good,
    Poor,
}

impl PostureStatus {
    pub fn from_analysis(analysis: Option<&AnalysisResult>) -> Self {
        match analysis {
            None => PostureStatus::Idle,
            Some(result) if result.is_good_posture => PostureStatus::Good,
            Some(_) => PostureStatus::Poor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PostureStatus::Idle => "Waiting for analysis",
            PostureStatus::Good => "Good Posture",
            PostureStatus::Poor => "Poor Posture",
        }
    }
}

impl std::fmt::Display for PostureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The pose estimator never loaded; analysis is unavailable
    Initialization(InitializationError),
    Source(SourceError),
    Loop(LoopError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Initialization(e) => write!(f, "{e}"),
            SessionError::Source(e) => write!(f, "{e}"),
            SessionError::Loop(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SourceError> for SessionError {
    fn from(e: SourceError) -> Self {
        SessionError::Source(e)
    }
}

impl From<LoopError> for SessionError {
    fn from(e: LoopError) -> Self {
        SessionError::Loop(e)
    }
}

/// One interactive analysis session.
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    source: SharedFrameSource,
    analysis: Result<AnalysisLoop, InitializationError>,
    results: Receiver<AnalysisResult>,
    current: Option<AnalysisResult>,
    history: AnalysisHistory,
    stats: SharedLoopStats,
}

impl Session {
    /// Create a session over `backend`.
    ///
    /// `estimator` is the outcome of loading the pose estimator. A failed
    /// load is kept as the session's initialization error; the source still
    /// works but analysis can never start.
    pub fn new(
        config: &Config,
        backend: Box<dyn VideoBackend>,
        estimator: Result<Arc<dyn PoseEstimator>, InitializationError>,
    ) -> Self {
        let source = FrameSource::new(backend).shared();
        let stats = create_shared_stats();
        let classifier = PostureClassifier::new(config.thresholds);

        let analysis = estimator.map(|estimator| {
            AnalysisLoop::new(Arc::clone(&source), estimator, classifier)
                .with_interval(config.sample_interval)
                .with_channel_capacity(config.channel_capacity)
                .with_stats(Arc::clone(&stats))
        });
        let results = match &analysis {
            Ok(analysis) => analysis.subscribe(),
            Err(e) => {
                warn!("Pose estimator failed to initialize: {e}");
                crossbeam_channel::never()
            }
        };

        let history = match config.history_capacity {
            Some(capacity) => AnalysisHistory::with_capacity_limit(capacity),
            None => AnalysisHistory::new(),
        };

        let id = Uuid::new_v4();
        info!(session = %id, "Session created");

        Self {
            id,
            started_at: Utc::now(),
            source,
            analysis,
            results,
            current: None,
            history,
            stats,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The estimator load failure, if any.
    pub fn initialization_error(&self) -> Option<&InitializationError> {
        self.analysis.as_ref().err()
    }

    fn with_source<R>(&self, f: impl FnOnce(&mut FrameSource) -> R) -> R {
        let mut source = self
            .source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut source)
    }

    pub fn source_state(&self) -> FrameSourceState {
        self.with_source(|source| source.state().clone())
    }

    pub fn origin(&self) -> Option<FrameOrigin> {
        self.with_source(|source| source.origin().cloned())
    }

    /// Overlay for the most recent analysis, if it found a pose.
    pub fn overlay(&self) -> Option<OverlayScene> {
        self.with_source(|source| source.overlay().cloned())
    }

    pub fn loop_state(&self) -> AnalysisLoopState {
        match &self.analysis {
            Ok(analysis) => analysis.state(),
            Err(_) => AnalysisLoopState::Stopped,
        }
    }

    /// Switch to `origin`.
    ///
    /// Stops analysis and fully tears down the current origin before the new
    /// one is acquired. Results already emitted go to the history and the
    /// current verdict is cleared. Analysis is not restarted; call
    /// [`Session::start_analysis`] once the origin is active.
    pub fn switch_origin(&mut self, origin: FrameOrigin) -> Result<(), SessionError> {
        self.stop_analysis();
        self.sync_results();
        self.current = None;

        let label = origin.label();
        self.with_source(|source| {
            source.teardown();
            source.start(origin)
        })?;
        info!(session = %self.id, origin = label, "Origin switched");
        Ok(())
    }

    /// Start the analysis loop.
    pub fn start_analysis(&mut self) -> Result<(), SessionError> {
        match &mut self.analysis {
            Ok(analysis) => Ok(analysis.start()?),
            Err(e) => Err(SessionError::Initialization(e.clone())),
        }
    }

    /// Stop the analysis loop if it is running. Results still in flight are
    /// discarded.
    pub fn stop_analysis(&mut self) {
        if let Ok(analysis) = &mut self.analysis {
            if analysis.is_running() {
                let _ = analysis.stop();
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        Ok(self.with_source(|source| source.pause())?)
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        Ok(self.with_source(|source| source.resume())?)
    }

    /// Clear the displayed analysis. The origin keeps running.
    pub fn reset(&mut self) {
        self.with_source(|source| source.reset());
        self.current = None;
    }

    /// Stop analysis and release the origin. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.stop_analysis();
        self.with_source(|source| source.teardown());
        self.current = None;
    }

    fn record(&mut self, result: AnalysisResult) {
        self.history.record(result.clone());
        self.current = Some(result);
    }

    /// Move every emitted result into the current verdict and history.
    ///
    /// Returns how many results were taken.
    pub fn sync_results(&mut self) -> usize {
        let pending: Vec<AnalysisResult> = self.results.try_iter().collect();
        let count = pending.len();
        for result in pending {
            self.record(result);
        }
        count
    }

    /// Wait up to `timeout` for the next result and record it.
    pub fn next_result(&mut self, timeout: Duration) -> Option<AnalysisResult> {
        match self.results.recv_timeout(timeout) {
            Ok(result) => {
                self.record(result.clone());
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Register an additional consumer of results.
    pub fn subscribe(&self) -> Option<Receiver<AnalysisResult>> {
        self.analysis.as_ref().ok().map(|analysis| analysis.subscribe())
    }

    pub fn current(&self) -> Option<&AnalysisResult> {
        self.current.as_ref()
    }

    pub fn status(&self) -> PostureStatus {
        PostureStatus::from_analysis(self.current.as_ref())
    }

    pub fn history(&self) -> &AnalysisHistory {
        &self.history
    }

    pub fn stats(&self) -> LoopStatsSnapshot {
        self.stats.stats()
    }

    pub fn loop_summary(&self) -> String {
        self.stats.summary()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::PostureIssue;
    use crate::source::SyntheticBackend;

    #[test]
    fn test_status_from_analysis() {
        let now = Utc::now();
        let good = AnalysisResult::new(Vec::new(), 0.9, now);
        let poor = AnalysisResult::new(vec![PostureIssue::Slouching], 0.9, now);

        assert_eq!(PostureStatus::from_analysis(None), PostureStatus::Idle);
        assert_eq!(PostureStatus::from_analysis(Some(&good)), PostureStatus::Good);
        assert_eq!(PostureStatus::from_analysis(Some(&poor)), PostureStatus::Poor);
        assert_eq!(PostureStatus::Poor.to_string(), "Poor Posture");
    }

    #[test]
    fn test_initialization_failure_blocks_analysis() {
        let error = InitializationError::Io("model missing".to_string());
        let mut session = Session::new(
            &Config::default(),
            Box::new(SyntheticBackend::new()),
            Err(error.clone()),
        );

        assert_eq!(session.initialization_error(), Some(&error));
        assert_eq!(
            session.start_analysis(),
            Err(SessionError::Initialization(error))
        );
        assert_eq!(session.loop_state(), AnalysisLoopState::Stopped);
        assert!(session.subscribe().is_none());

        // The origin is still usable
        session
            .switch_origin(FrameOrigin::Camera(Default::default()))
            .unwrap();
        assert_eq!(session.source_state(), FrameSourceState::Active);
        assert_eq!(session.sync_results(), 0);
    }
}
