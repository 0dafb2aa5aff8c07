//! PostureAI Agent CLI
//!
//! Real-time posture analysis from a camera or video file.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use postureai_agent::{
    analysis::parse_pose_lines, Config, FrameOrigin, PoseEstimator, PostureClassifier,
    PostureIssue, ReplayEstimator, Session, SyntheticBackend, VideoBlob, POSTURE_GUIDE, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "postureai")]
#[command(author = "PostureAI")]
#[command(version = VERSION)]
#[command(about = "Real-time posture analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a live analysis session
    Start {
        /// Analyze a video file instead of the camera
        #[arg(long)]
        file: Option<PathBuf>,

        /// Recorded poses to replay (JSON lines, one array of poses per frame)
        #[arg(long)]
        poses: PathBuf,

        /// Camera width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Camera height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Simulated estimator latency in milliseconds
        #[arg(long, default_value = "0")]
        latency_ms: u64,

        /// Write the session history to the export directory on exit
        #[arg(long)]
        export: bool,
    },

    /// Classify recorded poses and print the results as JSON lines
    Classify {
        /// Input file (JSON lines, one array of poses per frame)
        #[arg(long, short)]
        input: PathBuf,
    },

    /// Display posture guidelines
    Guide,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            file,
            poses,
            width,
            height,
            duration,
            latency_ms,
            export,
        } => cmd_start(file, &poses, width, height, duration, latency_ms, export),
        Commands::Classify { input } => cmd_classify(&input),
        Commands::Guide => {
            cmd_guide();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("postureai_agent=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_start(
    file: Option<PathBuf>,
    poses: &Path,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<u64>,
    latency_ms: u64,
    export: bool,
) -> Result<()> {
    println!("PostureAI Agent v{VERSION}");
    println!();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load configuration: {e}");
        Config::default()
    });
    if let Some(width) = width {
        config.camera.width = width;
    }
    if let Some(height) = height {
        config.camera.height = height;
    }
    config.validate().context("Invalid configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let _guard = runtime.enter();

    let estimator = ReplayEstimator::from_path(poses).map(|estimator| {
        Arc::new(estimator.with_latency(Duration::from_millis(latency_ms)))
            as Arc<dyn PoseEstimator>
    });
    let mut session = Session::new(&config, Box::new(SyntheticBackend::new()), estimator);
    if let Some(e) = session.initialization_error() {
        bail!("{e}");
    }

    let origin = match file {
        Some(path) => FrameOrigin::File(VideoBlob::new(path)),
        None => FrameOrigin::Camera(config.camera),
    };

    println!("Starting analysis...");
    println!("  Session: {}", session.id());
    match &origin {
        FrameOrigin::Camera(c) => println!("  Source: camera ({}x{})", c.width, c.height),
        FrameOrigin::File(blob) => println!("  Source: file {:?}", blob.path),
    }
    println!(
        "  Sample interval: {}ms",
        config.sample_interval.as_millis()
    );
    println!();

    session
        .switch_origin(origin)
        .context("Could not open video source")?;
    session.start_analysis()?;

    println!("Press Ctrl+C to stop");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut last_issues: Option<Vec<PostureIssue>> = None;

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        let Some(result) = session.next_result(Duration::from_millis(100)) else {
            continue;
        };

        // Only report changes in the verdict
        if last_issues.as_ref() == Some(&result.issues) {
            continue;
        }
        let issues: Vec<&str> = result.issues.iter().map(|i| i.as_str()).collect();
        println!(
            "[{}] {} (confidence {:.1}%){}",
            result.timestamp.format("%H:%M:%S%.3f"),
            session.status(),
            result.confidence * 100.0,
            if issues.is_empty() {
                String::new()
            } else {
                format!(": {}", issues.join("; "))
            }
        );
        last_issues = Some(result.issues);
    }

    println!();
    println!("Stopping analysis...");
    session.stop_analysis();
    session.sync_results();

    println!();
    println!("{}", session.history().summary());
    println!();
    println!("{}", session.loop_summary());

    if export && !session.history().is_empty() {
        export_history(&config, &session)?;
    }

    session.teardown();
    Ok(())
}

fn export_history(config: &Config, session: &Session) -> Result<()> {
    config
        .ensure_directories()
        .context("Could not create export directory")?;

    let export_path = config.export_path.join(format!(
        "session_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let document = serde_json::json!({
        "session_id": session.id(),
        "started_at": session.started_at(),
        "stats": session.history().stats(),
        "analyses": session.history().entries(),
    });
    let json = serde_json::to_string_pretty(&document).context("Error serializing history")?;
    std::fs::write(&export_path, json)
        .with_context(|| format!("Error writing history to {export_path:?}"))?;

    println!(
        "Exported {} analyses to {:?}",
        session.history().total(),
        export_path
    );
    Ok(())
}

fn cmd_classify(input: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Could not read {input:?}"))?;
    let frames = parse_pose_lines(&content)
        .map_err(|(line, e)| anyhow::anyhow!("{input:?} line {line}: {e}"))?;

    let config = Config::load().unwrap_or_default();
    let classifier = PostureClassifier::new(config.thresholds);

    for poses in &frames {
        let result = classifier.classify(poses);
        println!("{}", serde_json::to_string(&result)?);
    }
    Ok(())
}

fn cmd_guide() {
    println!("{POSTURE_GUIDE}");
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
