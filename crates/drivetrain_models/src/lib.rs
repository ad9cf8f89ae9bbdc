//! # DRIVETRAIN Models
//!
//! The three subsystem models, free of any transport.
//!
//! | Model | Input | Output |
//! |---|---|---|
//! | [`EngineModel`] | prior kinematics + [`DriverControls`] + dt | [`EngineOutput`] |
//! | [`TransmissionModel`] | speed, gear, rpm, reverse, throttle | [`GearDecision`] |
//! | [`FuelModel`] | power + current fuel | [`FuelDecision`] |
//!
//! Every input is normalised into a valid decision: models never fail.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::perf)]
#![warn(clippy::pedantic)]

pub mod controls;
pub mod engine;
pub mod fuel;
pub mod transmission;

pub use controls::{
    ControlInput, ControlSource, DriverControls, Key, KeyboardControls, ScriptStep,
    ScriptedControls, SteerIntent,
};
pub use engine::{EngineModel, EngineOutput, KinematicState, RotationalState};
pub use fuel::{FuelDecision, FuelInput, FuelModel};
pub use transmission::{GearDecision, ShiftReason, TransmissionInput, TransmissionModel};
