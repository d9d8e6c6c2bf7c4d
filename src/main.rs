use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use tilespawn::job::{Profile, TilingJob, WorkerCommand, ZoomRange};
use tilespawn::registry::JobRegistry;
use tilespawn::signal::SignalBridge;
use tilespawn::supervisor::JobSupervisor;

/// Spawn and supervise one gdal2tiles tiling worker run
#[derive(Parser)]
#[command(name = "tilespawn")]
#[command(about = "Spawn and supervise a gdal2tiles tiling worker", long_about = None)]
#[command(version)]
struct Cli {
    /// Opaque job identifier reported back when the job reaches a terminal state
    #[arg(short = 'j', long)]
    job_id: String,

    /// Path to the image to tile
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Projection profile for the tiler
    #[arg(short = 'p', long, value_enum)]
    profile: Profile,

    /// Zoom levels, a single level ("15") or an inclusive range ("15-22")
    #[arg(short = 'z', long)]
    zoom: ZoomRange,

    /// Alpha-layer specification, forwarded verbatim to the worker
    #[arg(short = 'a', long)]
    alpha: String,

    /// Seconds to wait for worker exit after its output ends (1800 is
    /// customary for collecting stalled jobs)
    #[arg(short = 't', long, value_name = "SECONDS")]
    timeout: u64,

    /// Output directory; the worker picks its own default when omitted
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Worker script to run
    #[arg(long, default_value = "gdal2tiles_mp.py")]
    worker: String,

    /// Interpreter for the worker script
    #[arg(long, default_value = "python3")]
    interpreter: String,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("tilespawn started with verbosity level: {}", cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("fatal error: {err}");
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let job = TilingJob {
        job_id: cli.job_id,
        input: cli.input,
        profile: cli.profile,
        zoom: cli.zoom,
        alpha: cli.alpha,
        timeout: Duration::from_secs(cli.timeout),
        output: cli.output,
        worker: WorkerCommand {
            interpreter: cli.interpreter,
            binary: cli.worker,
        },
    };

    let bridge =
        SignalBridge::install(CancellationToken::new()).context("installing signal handlers")?;

    let bar = (!cli.no_progress).then(|| {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos:>3}% {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        bar
    });

    let mut supervisor = JobSupervisor::new(job, JobRegistry::new(), bridge.job_token())
        .on_done(|job_id| debug!(job_id, "done callback fired"));
    if let Some(bar) = bar.clone() {
        supervisor = supervisor.on_progress(move |percent| {
            // The curve is unclamped; only the display saturates at 100.
            bar.set_position(percent.min(100.0) as u64);
        });
    }

    let outcome = supervisor.run().await?;
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    Ok(outcome.exit_code())
}
