//! # DRIVETRAIN Networking
//!
//! The tick orchestrator and the subsystem actors it drives.
//!
//! ## Architecture
//!
//! - **Protocol**: fixed-size C-layout records, one request and one reply per exchange
//! - **Sessions**: one persistent byte stream per subsystem, opened with a role tag
//! - **Registration**: exactly one engine, transmission and fuel session before the first tick
//! - **Orchestrator**: Engine → Transmission → Fuel every tick, merging each reply
//! - **Actors**: blocking serve loops around the pure models
//!
//! ## Failure Model
//!
//! ```text
//! ORCHESTRATOR                       SUBSYSTEM
//!   |                                    |
//!   |--- request ----------------------->|
//!   |<-- reply --------------------------|   ok: merge, next exchange
//!   |                                    |
//!   |--- request ----------------------->|
//!   |<-- EOF / short record -------------|   fatal: shutdown + close all
//! ```
//!
//! A lost subsystem ends the run. There is no reconnection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use drivetrain_networking::{Orchestrator, Registrar, ShutdownSignal};
//!
//! let shutdown = ShutdownSignal::new();
//! let sessions = Registrar::from_settings(&config.server).accept(&listener, &shutdown)?;
//! let report = Orchestrator::new(store, sessions, config.server.tick_period(), shutdown).run();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::perf)]
#![warn(clippy::pedantic)]

pub mod actors;
pub mod protocol;
pub mod server;
pub mod session;
pub mod signal;
pub mod telemetry;

pub use actors::{
    serve, ActorExit, ActorReport, EngineActor, EngineClock, FuelActor, Subsystem,
    TransmissionActor,
};
pub use protocol::{
    EngineReply, EngineRequest, FuelReply, FuelRequest, Role, TransmissionReply,
    TransmissionRequest,
};
pub use server::{
    ExitReason, Orchestrator, Registrar, RegistrationError, RegistrationResult, RegistrationStats,
    RunReport, SessionSet, TickStats, PIPELINE,
};
pub use session::{Session, SessionError, SessionResult, Transport};
pub use signal::{
    install_termination_handler, ShutdownSignal, TerminationAction, FORCED_EXIT_CODE,
};
pub use telemetry::init_tracing;
