//! Passive observer: polls the published segment and prints a status line
//! until the orchestrator marks the state shut down.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use drivetrain_core::{SegmentReader, SimConfig, TripComputer};
use drivetrain_networking::{init_tracing, install_termination_handler, ShutdownSignal};

const OPEN_RETRY: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "monitor", about = "Read-only vehicle state observer")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the shared segment path.
    #[arg(long)]
    segment: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = SimConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    let path = args.segment.unwrap_or(config.segment.path);

    let shutdown = ShutdownSignal::new();
    install_termination_handler(shutdown.clone()).context("failed to install signal handler")?;

    let Some(reader) = open_when_ready(&path, &shutdown) else {
        return Ok(());
    };
    tracing::info!(path = %path.display(), "observing segment");

    let mut trip = TripComputer::new(config.monitor.overspeed_kmph, config.fuel.tank_capacity);
    let mut last = Instant::now();

    while !shutdown.is_requested() {
        let state = reader.snapshot();
        let now = Instant::now();
        let report = trip.observe(&state, now.duration_since(last).as_secs_f64());
        last = now;

        println!("{report}");
        if state.shutdown {
            tracing::info!(distance = trip.distance(), "simulation shut down");
            break;
        }
        thread::sleep(config.monitor.poll_interval());
    }
    Ok(())
}

/// Waits for the orchestrator to create the segment.
fn open_when_ready(path: &std::path::Path, shutdown: &ShutdownSignal) -> Option<SegmentReader> {
    let mut logged = false;
    while !shutdown.is_requested() {
        match SegmentReader::open(path) {
            Ok(reader) => return Some(reader),
            Err(e) => {
                if !logged {
                    tracing::info!(error = %e, "segment not ready, retrying");
                    logged = true;
                }
                thread::sleep(OPEN_RETRY);
            }
        }
    }
    None
}
