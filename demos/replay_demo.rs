//! Demonstration of a PostureAI analysis session.
//!
//! This example shows how to:
//! 1. Build a pose track in memory and replay it as the pose estimator
//! 2. Open a camera origin on the synthetic backend
//! 3. Run the analysis loop and follow the verdicts
//! 4. Switch to a file origin mid-session
//! 5. Summarize the session history
//!
//! Run with: cargo run --example replay_demo

use std::sync::Arc;
use std::time::Duration;

use postureai_agent::{
    Config, FrameOrigin, KeypointName, Pose, PoseEstimator, ReplayEstimator, Session,
    SyntheticBackend, VideoBlob, POSTURE_GUIDE,
};

/// Upright desk posture in 640x480 pixel space.
fn upright() -> Pose {
    Pose::new()
        .with(KeypointName::Nose, 320.0, 100.0, 0.95)
        .with(KeypointName::LeftShoulder, 280.0, 180.0, 0.9)
        .with(KeypointName::RightShoulder, 360.0, 182.0, 0.9)
        .with(KeypointName::LeftHip, 290.0, 400.0, 0.85)
        .with(KeypointName::RightHip, 350.0, 402.0, 0.85)
}

/// Head pushed forward and one shoulder dropped.
fn head_forward() -> Pose {
    upright()
        .with(KeypointName::Nose, 400.0, 100.0, 0.95)
        .with(KeypointName::RightShoulder, 360.0, 230.0, 0.9)
}

fn main() {
    println!("PostureAI Agent - Replay Demo");
    println!("=============================");
    println!("{POSTURE_GUIDE}");

    let track = vec![
        vec![upright()],
        vec![upright()],
        vec![head_forward()],
        Vec::new(),
    ];
    let estimator = ReplayEstimator::new(track)
        .map(|e| Arc::new(e.with_latency(Duration::from_millis(40))) as Arc<dyn PoseEstimator>);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            return;
        }
    };

    runtime.block_on(async {
        let config = Config::default();
        let mut session = Session::new(&config, Box::new(SyntheticBackend::new()), estimator);

        println!("Session: {}", session.id());
        println!();

        if let Err(e) = session.switch_origin(FrameOrigin::Camera(config.camera)) {
            eprintln!("Error opening camera: {e}");
            return;
        }
        if let Err(e) = session.start_analysis() {
            eprintln!("Error starting analysis: {e}");
            return;
        }

        println!("Analyzing camera for 2 seconds...");
        follow(&mut session, 2).await;

        // Switching needs a real path; the synthetic backend only checks it exists
        let clip = std::env::temp_dir().join("postureai-demo-clip.mp4");
        if std::fs::write(&clip, b"demo").is_ok() {
            println!();
            println!("Switching to file {clip:?}...");
            match session.switch_origin(FrameOrigin::File(VideoBlob::new(&clip))) {
                Ok(()) => {
                    if session.start_analysis().is_ok() {
                        follow(&mut session, 1).await;
                    }
                }
                Err(e) => eprintln!("Error opening file: {e}"),
            }
        }

        session.teardown();
        let _ = std::fs::remove_file(&clip);

        println!();
        println!("{}", session.history().summary());
        println!();
        println!("{}", session.loop_summary());
    });

    println!();
    println!("Demo complete!");
}

/// Print every verdict emitted over the next `secs` seconds.
async fn follow(session: &mut Session, secs: u64) {
    for _ in 0..secs * 4 {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let before = session.history().total();
        session.sync_results();
        for result in session.history().entries().iter().skip(before) {
            let issues: Vec<&str> = result.issues.iter().map(|i| i.as_str()).collect();
            println!(
                "  [{}] {:<13} {:>5.1}%  {}",
                result.timestamp.format("%H:%M:%S%.3f"),
                if result.is_good_posture { "good" } else { "poor" },
                result.confidence * 100.0,
                issues.join("; ")
            );
        }
    }
}
