//! # Tick Orchestrator
//!
//! Drives the simulation: one ordered pipeline of blocking exchanges per
//! tick, each followed by a merge into the canonical state.
//!
//! ```text
//! ┌──────────── tick ────────────┐
//! │ snapshot ─► Engine ─► merge  │
//! │ snapshot ─► Trans  ─► merge  │
//! │ snapshot ─► Fuel   ─► merge  │
//! └──────────── sleep ───────────┘
//! ```
//!
//! The store lock is taken for each snapshot and each merge, never across
//! an exchange. Any session failure is fatal: the loop stops, the state is
//! marked shut down, then every session is closed.

use std::fmt;
use std::time::Duration;

use drivetrain_core::{StateDelta, StateStore};
use thiserror::Error;

use crate::protocol::{
    EngineReply, EngineRequest, FuelReply, FuelRequest, Role, TransmissionReply,
    TransmissionRequest,
};
use crate::server::registration::SessionSet;
use crate::server::tick::{TickPacer, TickStats};
use crate::session::{SessionError, Transport};
use crate::signal::ShutdownSignal;

/// Exchange order within a tick.
pub const PIPELINE: [Role; 3] = [Role::Engine, Role::Transmission, Role::Fuel];

/// A failed exchange, and which subsystem it was with.
#[derive(Error, Debug)]
#[error("{role} exchange failed: {source}")]
pub struct ExchangeError {
    /// Subsystem the exchange was with.
    pub role: Role,
    /// What went wrong.
    #[source]
    pub source: SessionError,
}

/// Why the tick loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// A termination signal was raised.
    Signal,
    /// The canonical state was already marked shut down.
    StateShutdown,
    /// A subsystem session failed.
    Disconnected(Role),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("termination signal"),
            Self::StateShutdown => f.write_str("state marked shutdown"),
            Self::Disconnected(role) => write!(f, "{role} disconnected"),
        }
    }
}

/// Summary of a finished run.
#[derive(Clone, Copy, Debug)]
pub struct RunReport {
    /// Ticks completed.
    pub ticks: u64,
    /// Why the loop stopped.
    pub exit: ExitReason,
    /// Tick timing.
    pub stats: TickStats,
}

/// Owns the sessions and drives the canonical state through the pipeline.
pub struct Orchestrator<S, T> {
    store: S,
    sessions: SessionSet<T>,
    pacer: TickPacer,
    shutdown: ShutdownSignal,
}

impl<S: StateStore, T: Transport> Orchestrator<S, T> {
    /// Creates an orchestrator over registered sessions.
    pub fn new(
        store: S,
        sessions: SessionSet<T>,
        period: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            sessions,
            pacer: TickPacer::new(period),
            shutdown,
        }
    }

    /// The canonical state store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one tick: every exchange in [`PIPELINE`] order.
    ///
    /// Stops at the first failure; merges already applied in this tick stay.
    pub fn step(&mut self) -> Result<(), ExchangeError> {
        for role in PIPELINE {
            self.exchange(role)
                .map_err(|source| ExchangeError { role, source })?;
        }
        Ok(())
    }

    fn exchange(&mut self, role: Role) -> Result<(), SessionError> {
        let snapshot = self.store.read_snapshot();
        let session = self.sessions.get_mut(role);

        let delta: StateDelta = match role {
            Role::Engine => session
                .exchange::<_, EngineReply>(&EngineRequest::from_state(&snapshot))?
                .to_delta(),
            Role::Transmission => session
                .exchange::<_, TransmissionReply>(&TransmissionRequest::from_state(&snapshot))?
                .to_delta(),
            Role::Fuel => session
                .exchange::<_, FuelReply>(&FuelRequest::from_state(&snapshot))?
                .to_delta(),
        };

        self.store.merge(&delta);
        Ok(())
    }

    /// Ticks until a termination signal, a shut-down state or a session
    /// failure. Always leaves the state marked shut down and every session
    /// closed.
    pub fn run(mut self) -> RunReport {
        tracing::info!(
            period_us = self.pacer.period().as_micros() as u64,
            "tick loop started"
        );

        let exit = loop {
            if self.shutdown.is_requested() {
                break ExitReason::Signal;
            }
            if self.store.is_shutdown() {
                break ExitReason::StateShutdown;
            }

            let start = self.pacer.begin_tick();
            if let Err(e) = self.step() {
                tracing::warn!(role = %e.role, error = %e.source, "subsystem lost, stopping");
                break ExitReason::Disconnected(e.role);
            }
            self.pacer.end_tick(start);

            if self.pacer.tick_count() % 600 == 0 {
                let state = self.store.read_snapshot();
                tracing::debug!(
                    tick = self.pacer.tick_count(),
                    speed = state.speed,
                    gear = state.gear,
                    rpm = state.rpm,
                    fuel = state.fuel,
                    "tick"
                );
            }
            self.pacer.wait_for_next_tick(start);
        };

        self.store.mark_shutdown();
        self.sessions.close_all();

        let stats = *self.pacer.stats();
        tracing::info!(%exit, %stats, "tick loop stopped");
        RunReport {
            ticks: self.pacer.tick_count(),
            exit,
            stats,
        }
    }
}

impl<S, T> fmt::Debug for Orchestrator<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pacer", &self.pacer)
            .finish_non_exhaustive()
    }
}
