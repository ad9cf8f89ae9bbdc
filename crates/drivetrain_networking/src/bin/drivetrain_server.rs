//! Tick orchestrator: owns the canonical state segment, registers the three
//! subsystems and drives them until a signal or a lost subsystem.

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use drivetrain_core::{SharedStateStore, SimConfig, StateStore};
use drivetrain_networking::{
    init_tracing, install_termination_handler, Orchestrator, Registrar, RegistrationError,
    ShutdownSignal,
};

#[derive(Parser, Debug)]
#[command(name = "drivetrain_server", about = "Vehicle drivetrain tick orchestrator")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Override the shared segment path.
    #[arg(long)]
    segment: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = SimConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(segment) = args.segment {
        config.segment.path = segment;
    }

    let store = Arc::new(
        SharedStateStore::create(&config.segment.path).with_context(|| {
            format!("failed to create segment {}", config.segment.path.display())
        })?,
    );

    let shutdown = ShutdownSignal::new();
    install_termination_handler(shutdown.clone()).context("failed to install signal handler")?;

    let listener = TcpListener::bind(config.server.bind_address)
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;
    tracing::info!(addr = %config.server.bind_address, "waiting for subsystems");

    let mut registrar = Registrar::from_settings(&config.server);
    let sessions = match registrar.accept(&listener, &shutdown) {
        Ok(sessions) => sessions,
        Err(RegistrationError::Cancelled) => {
            store.mark_shutdown();
            teardown(&store, config.segment.unlink_on_exit);
            return Ok(());
        }
        Err(e) => {
            store.mark_shutdown();
            teardown(&store, config.segment.unlink_on_exit);
            return Err(e).context("registration failed");
        }
    };
    tracing::info!(stats = ?registrar.stats(), "registration complete");
    drop(listener);

    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        sessions,
        config.server.tick_period(),
        shutdown,
    );
    let report = orchestrator.run();
    tracing::info!(ticks = report.ticks, exit = %report.exit, "simulation finished");

    teardown(&store, config.segment.unlink_on_exit);
    Ok(())
}

fn teardown(store: &SharedStateStore, unlink: bool) {
    if !unlink {
        return;
    }
    if let Err(e) = store.unlink() {
        tracing::warn!(error = %e, "failed to remove segment");
    }
}
