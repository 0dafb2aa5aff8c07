//! The periodic analysis loop.
//!
//! A tokio interval drives ticks. Each tick pulls the current frame and, if
//! no estimation is in flight, spawns one. Ticks that arrive while an
//! estimation is in flight are dropped rather than queued. Completed
//! estimations are classified and broadcast to every subscriber over a
//! bounded crossbeam channel.
//!
//! The in-flight flag belongs to the loop and outlives a single run: after a
//! stop and restart, ticks keep being skipped until the previous estimation
//! returns. Each run gets its own cancel token. `stop()` cancels the token
//! while holding the subscriber lock, and completions check the token under
//! the same lock before emitting, so nothing reaches a subscriber after
//! `stop()` returns.

use crate::analysis::clock::SessionClock;
use crate::analysis::estimator::PoseEstimator;
use crate::analysis::stats::{create_shared_stats, SharedLoopStats};
use crate::core::{OverlayScene, PostureClassifier};
use crate::pose::AnalysisResult;
use crate::source::{Frame, SharedFrameSource};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default tick period.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Default capacity of each subscriber channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Observable state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisLoopState {
    Stopped,
    /// Ticking with no estimation in flight
    Running,
    /// Ticking with one estimation in flight
    Busy,
}

/// Errors returned by loop control operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopError {
    AlreadyRunning,
    NotRunning,
    /// `start` was called outside a tokio runtime
    NoRuntime(String),
}

impl std::fmt::Display for LoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopError::AlreadyRunning => write!(f, "Analysis loop is already running"),
            LoopError::NotRunning => write!(f, "Analysis loop is not running"),
            LoopError::NoRuntime(e) => write!(f, "No async runtime available: {e}"),
        }
    }
}

impl std::error::Error for LoopError {}

/// Cancellation flag scoped to a single run of the loop.
#[derive(Debug, Clone, Default)]
struct RunToken(Arc<AtomicBool>);

impl RunToken {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type Subscribers = Arc<Mutex<Vec<Sender<AnalysisResult>>>>;

fn lock_subscribers(
    subscribers: &Mutex<Vec<Sender<AnalysisResult>>>,
) -> MutexGuard<'_, Vec<Sender<AnalysisResult>>> {
    subscribers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ActiveRun {
    token: RunToken,
    ticker: JoinHandle<()>,
}

/// Marks one estimation as in flight. Dropping it clears the busy flag, so
/// the flag is released even if the estimator panics.
struct InFlight {
    busy: Arc<AtomicBool>,
    stats: SharedLoopStats,
    pending: bool,
}

impl InFlight {
    /// Claim the busy flag, or `None` if an estimation is already in flight.
    fn acquire(busy: &Arc<AtomicBool>, stats: &SharedLoopStats) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                busy: Arc::clone(busy),
                stats: Arc::clone(stats),
                pending: false,
            })
    }

    fn begin(&mut self) {
        self.pending = true;
        self.stats.record_estimation_started();
    }

    fn mark_returned(&mut self) {
        self.pending = false;
        self.stats.record_estimation_completed();
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.pending {
            // Estimator panicked or the task was cancelled mid-call
            self.stats.record_estimation_completed();
            self.stats.record_estimation_failure();
            warn!("Pose estimation did not return");
        }
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Everything a tick and its estimation need, shared for one run.
struct RunContext {
    source: SharedFrameSource,
    estimator: Arc<dyn PoseEstimator>,
    classifier: PostureClassifier,
    subscribers: Subscribers,
    stats: SharedLoopStats,
    clock: SessionClock,
    token: RunToken,
    busy: Arc<AtomicBool>,
}

impl RunContext {
    fn on_tick(self: &Arc<Self>) {
        self.stats.record_tick();

        let Some(mut in_flight) = InFlight::acquire(&self.busy, &self.stats) else {
            self.stats.record_skipped_busy();
            debug!("Tick skipped, estimation in flight");
            return;
        };

        let frame = match self.source.lock() {
            Ok(mut source) => source.current_frame(),
            Err(_) => None,
        };
        let Some(frame) = frame else {
            self.stats.record_skipped_no_frame();
            return;
        };

        in_flight.begin();
        let ctx = Arc::clone(self);
        tokio::spawn(async move { ctx.run_estimation(frame, in_flight).await });
    }

    async fn run_estimation(&self, frame: Frame, mut in_flight: InFlight) {
        let outcome = self.estimator.estimate(&frame).await;
        in_flight.mark_returned();

        match outcome {
            Ok(poses) => {
                let result = self.classifier.classify_at(&poses, self.clock.now());
                let mut subscribers = lock_subscribers(&self.subscribers);
                if self.token.is_cancelled() {
                    self.stats.record_result_discarded();
                    debug!(frame = frame.sequence, "Discarding result from stopped run");
                    return;
                }

                let overlay = poses.first().map(|pose| OverlayScene::build(pose, &result));
                if let Ok(mut source) = self.source.lock() {
                    source.set_overlay(overlay);
                }

                subscribers.retain(|tx| match tx.try_send(result.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        warn!("Subscriber channel full, dropping result");
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                });
                self.stats.record_result_emitted();
                debug!(
                    frame = frame.sequence,
                    good = result.is_good_posture,
                    issues = result.issues.len(),
                    "Analysis complete"
                );
            }
            Err(e) => {
                if self.token.is_cancelled() {
                    self.stats.record_result_discarded();
                    return;
                }
                self.stats.record_estimation_failure();
                warn!(frame = frame.sequence, "Pose estimation failed: {e}");
            }
        }
    }
}

/// Periodic, single-flight posture analysis over a shared frame source.
pub struct AnalysisLoop {
    source: SharedFrameSource,
    estimator: Arc<dyn PoseEstimator>,
    classifier: PostureClassifier,
    interval: Duration,
    channel_capacity: usize,
    subscribers: Subscribers,
    stats: SharedLoopStats,
    clock: SessionClock,
    busy: Arc<AtomicBool>,
    run: Option<ActiveRun>,
}

impl AnalysisLoop {
    /// Create a stopped loop with the default tick period.
    pub fn new(
        source: SharedFrameSource,
        estimator: Arc<dyn PoseEstimator>,
        classifier: PostureClassifier,
    ) -> Self {
        Self {
            source,
            estimator,
            classifier,
            interval: DEFAULT_SAMPLE_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            stats: create_shared_stats(),
            clock: SessionClock::new(),
            busy: Arc::new(AtomicBool::new(false)),
            run: None,
        }
    }

    /// Tick period; clamped to at least one millisecond.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Share counters with another owner, such as a session.
    pub fn with_stats(mut self, stats: SharedLoopStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> SharedLoopStats {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> AnalysisLoopState {
        match &self.run {
            None => AnalysisLoopState::Stopped,
            Some(_) if self.busy.load(Ordering::SeqCst) => AnalysisLoopState::Busy,
            Some(_) => AnalysisLoopState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Register a new consumer of analysis results.
    pub fn subscribe(&self) -> Receiver<AnalysisResult> {
        let (tx, rx) = bounded(self.channel_capacity);
        lock_subscribers(&self.subscribers).push(tx);
        rx
    }

    /// Begin ticking. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if self.run.is_some() {
            return Err(LoopError::AlreadyRunning);
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| LoopError::NoRuntime(e.to_string()))?;

        let token = RunToken::default();
        let ctx = Arc::new(RunContext {
            source: Arc::clone(&self.source),
            estimator: Arc::clone(&self.estimator),
            classifier: self.classifier,
            subscribers: Arc::clone(&self.subscribers),
            stats: Arc::clone(&self.stats),
            clock: self.clock,
            token: token.clone(),
            busy: Arc::clone(&self.busy),
        });

        let period = self.interval;
        let ticker = handle.spawn(async move {
            // First tick one period after start
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                if ctx.token.is_cancelled() {
                    break;
                }
                ctx.on_tick();
            }
        });

        self.run = Some(ActiveRun { token, ticker });
        info!(interval_ms = period.as_millis() as u64, "Analysis loop started");
        Ok(())
    }

    /// Stop ticking. Any estimation still in flight finishes but its result
    /// is discarded, and a restarted loop does not tick into the estimator
    /// until it has returned.
    pub fn stop(&mut self) -> Result<(), LoopError> {
        let run = self.run.take().ok_or(LoopError::NotRunning)?;
        {
            let _subscribers = lock_subscribers(&self.subscribers);
            run.token.cancel();
        }
        run.ticker.abort();

        let in_flight = self.busy.load(Ordering::SeqCst);
        info!(in_flight, "Analysis loop stopped");
        Ok(())
    }
}

impl Drop for AnalysisLoop {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::estimator::ReplayEstimator;
    use crate::source::{FrameOrigin, FrameSource, SyntheticBackend};

    fn make_loop() -> AnalysisLoop {
        let source = FrameSource::new(Box::new(SyntheticBackend::new())).shared();
        let estimator = ReplayEstimator::new(vec![Vec::new()]).unwrap();
        AnalysisLoop::new(source, Arc::new(estimator), PostureClassifier::default())
    }

    #[test]
    fn test_start_requires_runtime() {
        let mut analysis = make_loop();
        assert!(matches!(analysis.start(), Err(LoopError::NoRuntime(_))));
        assert_eq!(analysis.state(), AnalysisLoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_transitions() {
        let mut analysis = make_loop();
        assert_eq!(analysis.stop(), Err(LoopError::NotRunning));

        analysis.start().unwrap();
        assert_eq!(analysis.state(), AnalysisLoopState::Running);
        assert_eq!(analysis.start(), Err(LoopError::AlreadyRunning));

        analysis.stop().unwrap();
        assert_eq!(analysis.state(), AnalysisLoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_estimate_reports_no_person() {
        let mut analysis = make_loop();
        analysis
            .source
            .lock()
            .unwrap()
            .start(FrameOrigin::Camera(Default::default()))
            .unwrap();
        let rx = analysis.subscribe();

        analysis.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        analysis.stop().unwrap();

        let result = rx.try_recv().unwrap();
        assert!(!result.is_good_posture);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.issues[0].as_str(), "No person detected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_subscriber_is_pruned() {
        let mut analysis = make_loop();
        analysis
            .source
            .lock()
            .unwrap()
            .start(FrameOrigin::Camera(Default::default()))
            .unwrap();
        let kept = analysis.subscribe();
        drop(analysis.subscribe());

        analysis.start().unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        analysis.stop().unwrap();

        assert_eq!(lock_subscribers(&analysis.subscribers).len(), 1);
        assert!(kept.try_iter().count() >= 2);
    }
}
