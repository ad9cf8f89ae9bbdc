//! Transmission subsystem: serves gear decisions to the orchestrator.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use drivetrain_core::SimConfig;
use drivetrain_networking::{init_tracing, serve, Role, Session, TransmissionActor};

#[derive(Parser, Debug)]
#[command(name = "transmission_client", about = "Transmission subsystem")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the orchestrator address.
    #[arg(long)]
    connect: Option<SocketAddr>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = SimConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    let addr = args.connect.unwrap_or(config.server.connect_address);

    let session = Session::connect_tcp(addr, Role::Transmission)?;
    let report = serve(TransmissionActor::new(config.transmission), session)
        .context("transmission session failed")?;
    tracing::info!(exchanges = report.exchanges, "transmission client done");
    Ok(())
}
