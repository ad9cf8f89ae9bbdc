//! # Orchestrator Server
//!
//! ```text
//! ┌──────────────┐   role tags   ┌──────────────┐
//! │  Registrar   │ ◄──────────── │  subsystems  │
//! └──────┬───────┘               └──────▲───────┘
//!        │ SessionSet                   │ request / reply
//! ┌──────▼───────┐   merge       ┌──────┴───────┐
//! │ Orchestrator │ ────────────► │  StateStore  │
//! └──────────────┘               └──────────────┘
//! ```
//!
//! Registration completes before the first tick; after that the session
//! set is fixed for the life of the run.

pub mod orchestrator;
pub mod registration;
pub mod tick;

pub use orchestrator::{ExchangeError, ExitReason, Orchestrator, RunReport, PIPELINE};
pub use registration::{
    Registrar, RegistrationError, RegistrationResult, RegistrationStats, SessionSet,
};
pub use tick::{TickPacer, TickStats};
