//! Integration tests for session lifecycle and origin switching

use postureai_agent::source::DeviceHandles;
use postureai_agent::{
    AnalysisLoopState, Config, DeviceAccessError, FrameOrigin, FrameSourceState,
    InitializationError, KeypointName, Pose, PoseEstimator, PostureIssue, PostureStatus,
    ReplayEstimator, Session, SessionError, SourceError, SyntheticBackend, VideoBlob,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn upright() -> Pose {
    Pose::new()
        .with(KeypointName::Nose, 320.0, 100.0, 0.9)
        .with(KeypointName::LeftShoulder, 280.0, 180.0, 0.9)
        .with(KeypointName::RightShoulder, 360.0, 180.0, 0.9)
        .with(KeypointName::LeftHip, 290.0, 400.0, 0.9)
        .with(KeypointName::RightHip, 350.0, 400.0, 0.9)
}

fn uneven() -> Pose {
    upright().with(KeypointName::RightShoulder, 360.0, 240.0, 0.9)
}

fn replay(track: Vec<Vec<Pose>>) -> Result<Arc<dyn PoseEstimator>, InitializationError> {
    ReplayEstimator::new(track).map(|e| Arc::new(e) as Arc<dyn PoseEstimator>)
}

fn session_with(backend: SyntheticBackend, track: Vec<Vec<Pose>>) -> Session {
    Session::new(&Config::default(), Box::new(backend), replay(track))
}

fn temp_clip(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "postureai-{name}-{}.mp4",
        uuid::Uuid::new_v4()
    ));
    std::fs::write(&path, b"clip").unwrap();
    path
}

fn camera() -> FrameOrigin {
    FrameOrigin::Camera(Default::default())
}

#[tokio::test(start_paused = true)]
async fn test_results_reach_history_and_status() {
    let mut session = session_with(SyntheticBackend::new(), vec![vec![upright()]]);
    assert_eq!(session.status(), PostureStatus::Idle);

    session.switch_origin(camera()).unwrap();
    session.start_analysis().unwrap();
    tokio::time::sleep(Duration::from_millis(550)).await;

    assert_eq!(session.sync_results(), 5);
    assert_eq!(session.history().total(), 5);
    assert_eq!(session.status(), PostureStatus::Good);
    assert!(session.overlay().is_some());
    assert_eq!(session.stats().results_emitted, 5);
}

#[tokio::test(start_paused = true)]
async fn test_origin_switch_holds_one_handle() {
    let backend = SyntheticBackend::new();
    let handles: DeviceHandles = backend.handles();
    let clip = temp_clip("switch");
    let mut session = session_with(backend, vec![vec![upright()]]);

    session.switch_origin(camera()).unwrap();
    session.start_analysis().unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(handles.open(), 1);

    session
        .switch_origin(FrameOrigin::File(VideoBlob::new(&clip)))
        .unwrap();
    assert_eq!(session.loop_state(), AnalysisLoopState::Stopped);
    assert_eq!(session.status(), PostureStatus::Idle);
    assert_eq!(handles.open(), 1);

    session.start_analysis().unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    session.switch_origin(camera()).unwrap();
    assert_eq!(handles.open(), 1);

    session.teardown();
    session.teardown();
    assert_eq!(handles.open(), 0);
    assert_eq!(handles.peak(), 1);
    assert_eq!(session.source_state(), FrameSourceState::Stopped);

    let _ = std::fs::remove_file(&clip);
}

#[tokio::test(start_paused = true)]
async fn test_device_error_then_manual_retry() {
    let backend = SyntheticBackend::new().failing_camera(DeviceAccessError::PermissionDenied);
    let control = backend.camera_control();
    let handles = backend.handles();
    let mut session = session_with(backend, vec![vec![upright()]]);

    let err = session.switch_origin(camera()).unwrap_err();
    assert_eq!(
        err,
        SessionError::Source(SourceError::Device(DeviceAccessError::PermissionDenied))
    );
    assert_eq!(
        err.to_string(),
        "Camera access denied. Please allow camera permissions and refresh the page."
    );
    assert!(matches!(session.source_state(), FrameSourceState::Error(_)));
    assert_eq!(session.loop_state(), AnalysisLoopState::Stopped);
    assert_eq!(handles.open(), 0);

    control.clear_failure();
    session.switch_origin(camera()).unwrap();
    assert_eq!(session.source_state(), FrameSourceState::Active);
    assert_eq!(handles.open(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_file_is_reported() {
    let mut session = session_with(SyntheticBackend::new(), vec![vec![upright()]]);
    let err = session
        .switch_origin(FrameOrigin::File(VideoBlob::new("/no/such/clip.mp4")))
        .unwrap_err();
    assert!(matches!(err, SessionError::Source(SourceError::File(_))));
}

#[tokio::test(start_paused = true)]
async fn test_stop_analysis_freezes_history() {
    let mut session = session_with(SyntheticBackend::new(), vec![vec![uneven()]]);
    session.switch_origin(camera()).unwrap();
    session.start_analysis().unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    session.stop_analysis();
    session.sync_results();
    let total = session.history().total();
    assert_eq!(session.status(), PostureStatus::Poor);
    assert_eq!(
        session.current().map(|r| r.issues.clone()),
        Some(vec![PostureIssue::UnevenShoulders])
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(session.sync_results(), 0);
    assert_eq!(session.history().total(), total);
    // The origin stays open after analysis stops
    assert_eq!(session.source_state(), FrameSourceState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_and_reset() {
    let mut session = session_with(SyntheticBackend::new(), vec![vec![upright()]]);
    session.switch_origin(camera()).unwrap();
    session.start_analysis().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    session.sync_results();

    session.pause().unwrap();
    assert_eq!(session.source_state(), FrameSourceState::Paused);
    let before = session.history().total();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(session.sync_results(), 0);
    assert_eq!(session.history().total(), before);

    session.reset();
    assert_eq!(session.status(), PostureStatus::Idle);
    assert!(session.overlay().is_none());

    session.resume().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(session.sync_results() > 0);
    assert_eq!(session.status(), PostureStatus::Good);
}

#[tokio::test(start_paused = true)]
async fn test_pause_requires_active_origin() {
    let mut session = session_with(SyntheticBackend::new(), vec![vec![upright()]]);
    assert!(matches!(
        session.pause(),
        Err(SessionError::Source(SourceError::InvalidTransition { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_history_capacity_from_config() {
    let config = Config {
        history_capacity: Some(3),
        ..Config::default()
    };
    let mut session = Session::new(
        &config,
        Box::new(SyntheticBackend::new()),
        replay(vec![vec![upright()], Vec::new()]),
    );
    session.switch_origin(camera()).unwrap();
    session.start_analysis().unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;

    assert_eq!(session.sync_results(), 10);
    assert_eq!(session.history().total(), 3);
    assert_eq!(session.stats().results_emitted, 10);
}

#[tokio::test(start_paused = true)]
async fn test_initialization_failure_is_persistent() {
    let mut session = Session::new(
        &Config::default(),
        Box::new(SyntheticBackend::new()),
        replay(Vec::new()),
    );

    session.switch_origin(camera()).unwrap();
    for _ in 0..2 {
        assert!(matches!(
            session.start_analysis(),
            Err(SessionError::Initialization(InitializationError::Invalid(_)))
        ));
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(session.sync_results(), 0);
    assert_eq!(session.loop_state(), AnalysisLoopState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_replay_from_file() {
    let path = std::env::temp_dir().join(format!(
        "postureai-track-{}.jsonl",
        uuid::Uuid::new_v4()
    ));
    let line = serde_json::to_string(&vec![upright()]).unwrap();
    std::fs::write(&path, format!("{line}\n[]\n")).unwrap();

    let estimator =
        ReplayEstimator::from_path(&path).map(|e| Arc::new(e) as Arc<dyn PoseEstimator>);
    let mut session = Session::new(
        &Config::default(),
        Box::new(SyntheticBackend::new()),
        estimator,
    );
    session.switch_origin(camera()).unwrap();
    session.start_analysis().unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    session.stop_analysis();
    session.sync_results();

    let entries = session.history().entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].is_good_posture);
    assert_eq!(entries[1].issues, vec![PostureIssue::NoPersonDetected]);

    let _ = std::fs::remove_file(&path);
}
