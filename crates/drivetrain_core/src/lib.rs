//! # DRIVETRAIN Core
//!
//! The canonical vehicle state and everything that guards it.
//!
//! ## Design Principles
//!
//! 1. **One source of truth** - only the orchestrator mutates [`VehicleState`]
//! 2. **Clamp on merge** - every merge re-establishes the range invariants
//! 3. **Short critical sections** - the lock covers one read or one merge, never I/O
//! 4. **Passive observers** - the published segment is polled, never pushed
//!
//! ## Example
//!
//! ```rust,ignore
//! use drivetrain_core::{SharedStateStore, StateDelta, StateStore};
//!
//! let store = SharedStateStore::create("/dev/shm/drivetrain_sim_shm")?;
//! store.merge(&StateDelta::Gear(1));
//! assert_eq!(store.read_snapshot().gear, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::perf)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod observer;
pub mod segment;
pub mod state;
pub mod store;

pub use config::{
    ControlParams, EngineParams, FuelParams, MonitorSettings, SegmentSettings, ServerSettings,
    SimConfig, TransmissionParams,
};
pub use error::{CoreError, CoreResult};
pub use observer::{DriveMode, FuelWarning, TripComputer, TripReport};
pub use segment::{PublishedState, SegmentReader, SharedStateStore};
pub use state::{gear, limits, wrap_heading, EngineUpdate, StateDelta, VehicleState};
pub use store::{LocalStateStore, StateStore};
