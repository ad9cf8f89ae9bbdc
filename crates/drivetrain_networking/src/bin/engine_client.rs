//! Engine subsystem: reads driver input and serves the engine model.
//!
//! Interactive keys (one per line, or several on a line): `w` accelerate,
//! `s` brake, `a`/`d` steer, `r` reverse, `e` engine start/stop, `q` quit.

use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Sender;
use drivetrain_core::SimConfig;
use drivetrain_models::{ControlSource, Key, KeyboardControls, ScriptedControls};
use drivetrain_networking::{init_tracing, serve, EngineActor, EngineClock, Role, Session};

#[derive(Parser, Debug)]
#[command(name = "engine_client", about = "Engine/drivetrain subsystem")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the orchestrator address.
    #[arg(long)]
    connect: Option<SocketAddr>,

    /// Drive a built-in lap instead of reading keys from stdin.
    #[arg(long)]
    autopilot: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = SimConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    let addr = args.connect.unwrap_or(config.server.connect_address);

    if args.autopilot {
        run(&config, addr, ScriptedControls::autopilot())
    } else {
        let (tx, rx) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("stdin-keys".into())
            .spawn(move || read_keys(&tx))
            .context("failed to start input thread")?;
        run(&config, addr, KeyboardControls::new(rx, config.controls.hold_ticks))
    }
}

fn run<C: ControlSource>(config: &SimConfig, addr: SocketAddr, source: C) -> Result<()> {
    let session = Session::connect_tcp(addr, Role::Engine)?;
    let actor = EngineActor::new(
        config.engine.clone(),
        config.controls.clone(),
        source,
        EngineClock::measured(),
    );
    let report = serve(actor, session).context("engine session failed")?;
    tracing::info!(exchanges = report.exchanges, exit = ?report.exit, "engine client done");
    Ok(())
}

/// Forwards typed keys until stdin closes or the receiver goes away.
fn read_keys(tx: &Sender<Key>) {
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        for key in line.chars().filter_map(Key::from_char) {
            if tx.send(key).is_err() {
                return;
            }
        }
    }
}
