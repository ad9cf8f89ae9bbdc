//! # Canonical Vehicle State
//!
//! The single authoritative vehicle state and the clamp policy applied to it.
//!
//! ## Ownership
//!
//! ```text
//! Engine ──┐
//! Trans  ──┼──► StateDelta ──► VehicleState::merge ──► enforce_invariants
//! Fuel   ──┘
//! ```
//!
//! Subsystems never see a `VehicleState`. They receive request records built
//! from a snapshot and answer with replies that become [`StateDelta`]s. Range
//! enforcement happens here, after every merge, and nowhere else.

use std::f64::consts::{PI, TAU};

/// Hard limits of the canonical state.
pub mod limits {
    /// Maximum speed in m/s.
    pub const SPEED_MAX: f64 = 60.0;
    /// Lowest rpm the state will hold after a merge.
    pub const RPM_MIN: f64 = 800.0;
    /// Highest rpm the state will hold.
    pub const RPM_MAX: f64 = 6500.0;
    /// Maximum engine power in watts.
    pub const POWER_MAX: f64 = 150_000.0;
    /// Fuel tank capacity in litres.
    pub const FUEL_CAPACITY: f64 = 100.0;
}

/// Gear numbering shared by every subsystem.
///
/// Gears travel on the wire as plain integers, so they are kept as `i32`.
pub mod gear {
    /// Reverse gear.
    pub const REVERSE: i32 = -1;
    /// Neutral.
    pub const NEUTRAL: i32 = 0;
    /// First forward gear.
    pub const FIRST: i32 = 1;
    /// Highest forward gear.
    pub const TOP: i32 = 5;

    /// Returns true if `gear` is one of {-1, 0, 1..5}.
    #[inline]
    #[must_use]
    pub const fn is_valid(gear: i32) -> bool {
        gear >= REVERSE && gear <= TOP
    }
}

/// Wraps an angle into (-π, π].
///
/// Non-finite input maps to 0.
#[must_use]
pub fn wrap_heading(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle % TAU;
    if wrapped > PI {
        wrapped - TAU
    } else if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Engine/drivetrain fields merged after the engine exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngineUpdate {
    /// Throttle position (0..1).
    pub throttle: f64,
    /// Brake position (0..1).
    pub brake: f64,
    /// Steering position (-1..1).
    pub steer: f64,
    /// Reverse direction selected.
    pub reverse: bool,
    /// Speed in m/s.
    pub speed: f64,
    /// Heading in radians.
    pub heading: f64,
    /// Position X in meters.
    pub x: f64,
    /// Position Y in meters.
    pub y: f64,
    /// Engine speed.
    pub rpm: f64,
    /// Engine power in watts.
    pub power: f64,
    /// Engine torque in N·m.
    pub torque: f64,
}

/// A subsystem's contribution to the canonical state.
///
/// Each variant names exactly the subset of fields one exchange may touch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StateDelta {
    /// Controls, kinematics and engine output.
    Engine(EngineUpdate),
    /// Gear selected by the transmission.
    Gear(i32),
    /// Fuel level reported by the fuel model.
    Fuel(f64),
}

/// The canonical vehicle state.
///
/// Created once with [`VehicleState::initial`], mutated only through
/// [`VehicleState::merge`] and [`VehicleState::mark_shutdown`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleState {
    /// Throttle position (0..1).
    pub throttle: f64,
    /// Brake position (0..1).
    pub brake: f64,
    /// Steering position (-1..1).
    pub steer: f64,
    /// Reverse direction selected.
    pub reverse: bool,
    /// Speed in m/s (0..60). Direction is carried by `reverse`.
    pub speed: f64,
    /// Current gear (-1, 0, 1..5).
    pub gear: i32,
    /// Heading in radians, (-π, π].
    pub heading: f64,
    /// Position X in meters.
    pub x: f64,
    /// Position Y in meters.
    pub y: f64,
    /// Engine speed. 0 before the first merge, 800..6500 after.
    pub rpm: f64,
    /// Engine power in watts (0..150000).
    pub power: f64,
    /// Engine torque in N·m (>= 0).
    pub torque: f64,
    /// Fuel in litres (0..100).
    pub fuel: f64,
    /// Set once by the orchestrator before teardown.
    pub shutdown: bool,
}

impl VehicleState {
    /// The startup state: everything zero except a full tank, in neutral.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            throttle: 0.0,
            brake: 0.0,
            steer: 0.0,
            reverse: false,
            speed: 0.0,
            gear: gear::NEUTRAL,
            heading: 0.0,
            x: 0.0,
            y: 0.0,
            rpm: 0.0,
            power: 0.0,
            torque: 0.0,
            fuel: limits::FUEL_CAPACITY,
            shutdown: false,
        }
    }

    /// Applies a subsystem delta, then re-establishes every range invariant.
    pub fn merge(&mut self, delta: &StateDelta) {
        match *delta {
            StateDelta::Engine(update) => {
                self.throttle = update.throttle;
                self.brake = update.brake;
                self.steer = update.steer;
                self.reverse = update.reverse;
                self.speed = update.speed;
                self.heading = update.heading;
                self.x = update.x;
                self.y = update.y;
                self.rpm = update.rpm;
                self.power = update.power;
                self.torque = update.torque;
            }
            StateDelta::Gear(gear) => self.gear = gear,
            StateDelta::Fuel(fuel) => self.fuel = fuel,
        }
        self.enforce_invariants();
    }

    /// Marks the state as shut down. Idempotent.
    #[inline]
    pub fn mark_shutdown(&mut self) {
        self.shutdown = true;
    }

    /// Clamps every field into its documented range.
    ///
    /// Non-finite values are treated as 0 before clamping.
    pub fn enforce_invariants(&mut self) {
        self.throttle = clamp_finite(self.throttle, 0.0, 1.0);
        self.brake = clamp_finite(self.brake, 0.0, 1.0);
        self.steer = clamp_finite(self.steer, -1.0, 1.0);
        self.speed = clamp_finite(self.speed, 0.0, limits::SPEED_MAX);
        self.rpm = clamp_finite(self.rpm, limits::RPM_MIN, limits::RPM_MAX);
        self.power = clamp_finite(self.power, 0.0, limits::POWER_MAX);
        self.torque = finite_or_zero(self.torque).max(0.0);
        self.fuel = clamp_finite(self.fuel, 0.0, limits::FUEL_CAPACITY);
        self.heading = wrap_heading(self.heading);
        self.x = finite_or_zero(self.x);
        self.y = finite_or_zero(self.y);
        if !gear::is_valid(self.gear) {
            self.gear = gear::NEUTRAL;
        }
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::initial()
    }
}

#[inline]
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[inline]
fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    finite_or_zero(value).clamp(min, max)
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn engine_update(speed: f64, rpm: f64) -> StateDelta {
        StateDelta::Engine(EngineUpdate {
            speed,
            rpm,
            ..EngineUpdate::default()
        })
    }

    #[test]
    fn test_initial_state() {
        let state = VehicleState::initial();
        assert_eq!(state.fuel, 100.0);
        assert_eq!(state.gear, gear::NEUTRAL);
        assert_eq!(state.speed, 0.0);
        assert_eq!(state.rpm, 0.0);
        assert!(!state.shutdown);
        assert_eq!(VehicleState::default(), state);
    }

    #[test]
    fn test_engine_merge_clamps_speed_and_rpm() {
        let mut state = VehicleState::initial();

        state.merge(&engine_update(75.0, 7000.0));
        assert_eq!(state.speed, 60.0);
        assert_eq!(state.rpm, 6500.0);

        state.merge(&engine_update(-3.0, 300.0));
        assert_eq!(state.speed, 0.0);
        assert_eq!(state.rpm, 800.0);
    }

    #[test]
    fn test_stopped_engine_rpm_raised_to_floor() {
        let mut state = VehicleState::initial();
        state.merge(&engine_update(0.0, 0.0));
        assert_eq!(state.rpm, limits::RPM_MIN);

        state.merge(&StateDelta::Fuel(90.0));
        assert_eq!(state.rpm, limits::RPM_MIN);
    }

    #[test]
    fn test_invalid_gear_falls_back_to_neutral() {
        let mut state = VehicleState::initial();
        state.merge(&StateDelta::Gear(3));
        assert_eq!(state.gear, 3);

        state.merge(&StateDelta::Gear(9));
        assert_eq!(state.gear, gear::NEUTRAL);

        state.merge(&StateDelta::Gear(-1));
        assert_eq!(state.gear, gear::REVERSE);

        state.merge(&StateDelta::Gear(-4));
        assert_eq!(state.gear, gear::NEUTRAL);
    }

    #[test]
    fn test_fuel_merge_clamps() {
        let mut state = VehicleState::initial();
        state.merge(&StateDelta::Fuel(140.0));
        assert_eq!(state.fuel, 100.0);
        state.merge(&StateDelta::Fuel(-1.0));
        assert_eq!(state.fuel, 0.0);
        state.merge(&StateDelta::Fuel(42.5));
        assert_eq!(state.fuel, 42.5);
    }

    #[test]
    fn test_merge_only_touches_named_fields() {
        let mut state = VehicleState::initial();
        state.merge(&StateDelta::Gear(2));
        state.merge(&StateDelta::Fuel(50.0));
        state.merge(&engine_update(10.0, 2000.0));

        assert_eq!(state.gear, 2);
        assert_eq!(state.fuel, 50.0);
        assert_eq!(state.speed, 10.0);
    }

    #[test]
    fn test_non_finite_values_are_neutralised() {
        let mut state = VehicleState::initial();
        state.merge(&StateDelta::Engine(EngineUpdate {
            speed: f64::NAN,
            heading: f64::INFINITY,
            x: f64::NAN,
            rpm: f64::NAN,
            torque: f64::NEG_INFINITY,
            ..EngineUpdate::default()
        }));
        assert_eq!(state.speed, 0.0);
        assert_eq!(state.heading, 0.0);
        assert_eq!(state.x, 0.0);
        assert_eq!(state.rpm, limits::RPM_MIN);
        assert_eq!(state.torque, 0.0);
    }

    #[test]
    fn test_wrap_heading_boundaries() {
        assert_eq!(wrap_heading(PI), PI);
        assert_eq!(wrap_heading(-PI), PI);
        assert!((wrap_heading(3.0 * PI).abs() - PI).abs() < 1e-9);
        assert!((wrap_heading(PI + 0.5) - (-PI + 0.5)).abs() < 1e-12);
        assert_eq!(wrap_heading(0.25), 0.25);
    }

    #[test]
    fn test_mark_shutdown_is_idempotent() {
        let mut state = VehicleState::initial();
        state.mark_shutdown();
        state.mark_shutdown();
        assert!(state.shutdown);
    }

    proptest! {
        #[test]
        fn prop_heading_always_wrapped(angle in -1.0e6f64..1.0e6) {
            let wrapped = wrap_heading(angle);
            prop_assert!(wrapped > -PI && wrapped <= PI);
        }

        #[test]
        fn prop_merge_restores_invariants(
            speed in -1.0e4f64..1.0e4,
            rpm in -1.0e5f64..1.0e5,
            fuel in -1.0e3f64..1.0e3,
            gear in -20i32..20,
        ) {
            let mut state = VehicleState::initial();
            state.merge(&engine_update(speed, rpm));
            state.merge(&StateDelta::Gear(gear));
            state.merge(&StateDelta::Fuel(fuel));

            prop_assert!((0.0..=limits::SPEED_MAX).contains(&state.speed));
            prop_assert!((limits::RPM_MIN..=limits::RPM_MAX).contains(&state.rpm));
            prop_assert!((0.0..=limits::FUEL_CAPACITY).contains(&state.fuel));
            prop_assert!(gear::is_valid(state.gear));
        }
    }
}
