mod config;
mod launcher;
mod pipeline;
mod probe;
mod session;
mod shutdown;
mod signals;
mod status;

use clap::Parser;
use session::PreviewSession;
use status::StatusEmitter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Supervises a continuous camera-preview pipeline: spawns the capture
/// process in its own process group, reports new frames to the parent
/// over a line protocol on stdout, and tears the group down on SIGINT
/// or SIGTERM.
#[derive(Parser, Debug)]
#[command(name = "previewd", version, about)]
pub struct Cli {
    /// Output file the pipeline overwrites with each frame
    #[arg(value_name = "OUTPUT_FILE")]
    output: PathBuf,

    /// Config file path
    #[arg(short, long, default_value = "preview.toml")]
    config: PathBuf,

    /// Capture one high-quality frame and exit, no preview
    #[arg(long)]
    capture_only: bool,

    /// Warm-up before the readiness probe, in milliseconds (overrides config)
    #[arg(long)]
    warmup_ms: Option<u64>,

    /// Monitor tick period, in milliseconds (overrides config)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Shutdown grace period before SIGKILL, in milliseconds (overrides config)
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Emit FRAME:<n> every this many frames (overrides config)
    #[arg(long)]
    report_every: Option<u64>,

    /// Ticks without a new frame before a liveness warning (overrides config)
    #[arg(long)]
    stale_after: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the status protocol; all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");
    run(cli).await
}

async fn run(cli: Cli) -> ExitCode {
    let mut emitter = StatusEmitter::stdio();

    let mut config = match config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            emitter.error(&e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(v) = cli.warmup_ms {
        config.timing.warmup_ms = v;
    }
    if let Some(v) = cli.tick_ms {
        config.timing.tick_ms = v;
    }
    if let Some(v) = cli.grace_ms {
        config.timing.grace_ms = v;
    }
    if let Some(v) = cli.report_every {
        config.monitor.report_every = v;
    }
    if let Some(v) = cli.stale_after {
        config.monitor.stale_after = v;
    }

    if let Some(dir) = cli.output.parent() {
        if !dir.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                emitter.error(&format!("Cannot create {}: {e}", dir.display()));
                return ExitCode::FAILURE;
            }
        }
    }

    if cli.capture_only {
        return if pipeline::snapshot(&cli.output, Duration::from_secs(5)).await {
            println!("SUCCESS: Photo captured to {}", cli.output.display());
            ExitCode::SUCCESS
        } else {
            emitter.error("Capture failed");
            ExitCode::FAILURE
        };
    }

    let spec = match config.pipeline.command.take() {
        Some(command) => pipeline::PipelineSpec {
            name: "configured",
            command,
            args: config.pipeline.args.clone(),
        },
        None => match pipeline::select() {
            Some(spec) => spec,
            None => {
                emitter.error("No capture backend available");
                return ExitCode::FAILURE;
            }
        },
    };

    let mut session = PreviewSession::new(cli.output, &config, emitter);
    if let Err(e) = signals::install(session.stop_handle()) {
        tracing::warn!(error = %e, "signal handlers not installed");
    }

    match session.run(&spec).await {
        Ok(frames) => {
            tracing::info!(frames, "preview finished");
            ExitCode::SUCCESS
        }
        // The session already emitted the ERROR line and tore down the child.
        Err(e) => {
            tracing::error!(error = %e, "preview failed");
            ExitCode::FAILURE
        }
    }
}
