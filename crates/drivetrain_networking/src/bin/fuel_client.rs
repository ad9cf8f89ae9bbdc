//! Fuel subsystem: integrates fuel burn for the orchestrator.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use drivetrain_core::SimConfig;
use drivetrain_networking::{init_tracing, serve, FuelActor, Role, Session};

#[derive(Parser, Debug)]
#[command(name = "fuel_client", about = "Fuel subsystem")]
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

    let session = Session::connect_tcp(addr, Role::Fuel)?;
    let report = serve(FuelActor::new(config.fuel), session).context("fuel session failed")?;
    tracing::info!(exchanges = report.exchanges, "fuel client done");
    Ok(())
}
