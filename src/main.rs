//! Funscript Copilot CLI
//!
//! Streams motion-derived actions from a video to a running script editor.

use anyhow::Context;
use clap::{Parser, Subcommand};
use funscript_copilot::{
    config::Config,
    core::EigenEstimator,
    pipeline::{probe_video, FfmpegOpener, FrameDelta, ProcessingLoop, ProcessingOptions},
    session::{
        action_queue, create_shared_control, SessionOptions, SharedControl, StreamingSession,
    },
    telemetry::create_shared_stats_with_persistence,
    VERSION,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "funscript-copilot")]
#[command(version = VERSION)]
#[command(about = "Streams motion-derived funscript actions to a script editor", long_about = None)]
struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the editor and generate actions on request
    Start {
        /// Video file
        #[arg(long, short)]
        input: PathBuf,

        /// Editor host
        #[arg(long)]
        host: Option<String>,

        /// Editor WebSocket port
        #[arg(long)]
        port: Option<u16>,

        /// Also write each activation's actions to a funscript file
        #[arg(long)]
        export: bool,
    },

    /// Show video stream information
    Probe {
        /// Video file
        #[arg(long, short)]
        input: PathBuf,
    },

    /// Show cumulative statistics
    Stats,

    /// Show configuration
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Start {
            input,
            host,
            port,
            export,
        } => cmd_start(&input, host, port, export),
        Commands::Probe { input } => cmd_probe(&input),
        Commands::Stats => cmd_stats(),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_start(
    input: &Path,
    host: Option<String>,
    port: Option<u16>,
    export: bool,
) -> anyhow::Result<()> {
    println!("Funscript Copilot v{VERSION}");
    println!();

    let mut config = Config::load().unwrap_or_default();
    if let Some(host) = host {
        config.session.host = host;
    }
    if let Some(port) = port {
        config.session.port = port;
    }
    config.export_funscript |= export;

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let opener = FfmpegOpener::probe(input)
        .with_context(|| format!("could not open video {}", input.display()))?;
    let info = opener.info().clone();

    println!("Video: {}", input.display());
    println!("  Size: {}x{}", info.width, info.height);
    println!("  Frame rate: {:.3} fps", info.fps);
    println!("  Editor: {}", config.session.url());
    println!(
        "  Funscript export: {}",
        if config.export_funscript {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let control = create_shared_control();
    ctrlc_handler(control.clone())?;

    let stats = create_shared_stats_with_persistence(config.data_path.join("stats.json"));
    let (writer, reader) = action_queue(config.session.queue_capacity);

    let session = StreamingSession::new(
        SessionOptions::from(&config.session),
        control.clone(),
        reader,
        stats.clone(),
    );
    let session_handle = session.spawn().context("could not start session thread")?;

    let estimator = EigenEstimator::new(config.estimator.n_components, config.estimator.amnesic)
        .context("invalid estimator configuration")?;

    let options = ProcessingOptions {
        batch_duration_secs: config.signal.batch_duration_secs,
        turnpoints: config.signal.turnpoints(),
        poll_interval: config.session.poll_interval,
        export_dir: config
            .export_funscript
            .then(|| config.export_path.clone()),
        export_stem: input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "copilot".to_string()),
    };

    let mut processing = ProcessingLoop::new(
        opener,
        FrameDelta::new(),
        estimator,
        writer,
        control.clone(),
        stats.clone(),
        options,
    )?;
    let result = processing.run();

    control.request_exit();
    if session_handle.join().is_err() {
        eprintln!("Warning: session thread panicked");
    }

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save stats: {e}");
    }

    println!();
    println!("{}", stats.summary());

    result.context("processing stopped with an error")
}

fn cmd_probe(input: &Path) -> anyhow::Result<()> {
    let info = probe_video(input)
        .with_context(|| format!("could not probe {}", input.display()))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_stats() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Funscript Copilot Statistics");
    println!("============================");
    println!();

    let stats_path = config.data_path.join("stats.json");
    if !stats_path.exists() {
        println!("No previous run data found.");
        return Ok(());
    }

    let content = std::fs::read_to_string(&stats_path)?;
    let stats: serde_json::Value = serde_json::from_str(&content)?;
    println!("Cumulative Statistics:");
    for key in [
        "activations",
        "frames_processed",
        "batches_absorbed",
        "actions_emitted",
        "actions_sent",
        "actions_dropped",
        "commands_received",
    ] {
        if let Some(value) = stats.get(key) {
            println!("  {key}: {value}");
        }
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Ctrl+C requests a clean exit of both loops.
fn ctrlc_handler(control: SharedControl) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        control.request_exit();
    })
    .context("could not set Ctrl+C handler")
}
