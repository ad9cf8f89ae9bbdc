//! # Engine / Drivetrain Model
//!
//! One tick of vehicle kinematics from pedal positions.
//!
//! ## Sub-steps (in order)
//!
//! 1. Speed: engine-off, braking, accelerating or coasting
//! 2. Rotational state: rpm from speed and gearing, torque curve, power
//! 3. Heading: steering or self-centering
//! 4. Position: integrate signed speed along the heading

use std::f64::consts::PI;

use drivetrain_core::{gear, wrap_heading, EngineParams, EngineUpdate};

use crate::controls::DriverControls;

/// Prior kinematic state, as sent by the orchestrator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KinematicState {
    /// Speed in m/s.
    pub speed: f64,
    /// Fuel in litres.
    pub fuel: f64,
    /// Current gear.
    pub gear: i32,
    /// Heading in radians.
    pub heading: f64,
    /// Position X.
    pub x: f64,
    /// Position Y.
    pub y: f64,
}

/// Result of one engine tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngineOutput {
    /// Throttle position actually applied.
    pub throttle: f64,
    /// Brake position.
    pub brake: f64,
    /// Steering position.
    pub steer: f64,
    /// Reverse selected.
    pub reverse: bool,
    /// New speed, never negative.
    pub speed: f64,
    /// New heading.
    pub heading: f64,
    /// New position X.
    pub x: f64,
    /// New position Y.
    pub y: f64,
    /// Engine speed.
    pub rpm: f64,
    /// Engine power in watts.
    pub power: f64,
    /// Engine torque in N·m.
    pub torque: f64,
}

impl From<EngineOutput> for EngineUpdate {
    fn from(out: EngineOutput) -> Self {
        Self {
            throttle: out.throttle,
            brake: out.brake,
            steer: out.steer,
            reverse: out.reverse,
            speed: out.speed,
            heading: out.heading,
            x: out.x,
            y: out.y,
            rpm: out.rpm,
            power: out.power,
            torque: out.torque,
        }
    }
}

/// Rpm, torque and power for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RotationalState {
    /// Engine speed.
    pub rpm: f64,
    /// Torque in N·m.
    pub torque: f64,
    /// Power in watts.
    pub power: f64,
}

/// Stateless engine/drivetrain physics.
#[derive(Clone, Debug, Default)]
pub struct EngineModel {
    params: EngineParams,
}

impl EngineModel {
    /// Creates a model with the given constants.
    #[must_use]
    pub fn new(params: EngineParams) -> Self {
        Self { params }
    }

    /// The model's constants.
    #[must_use]
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Advances the vehicle by `dt` seconds.
    ///
    /// `dt` is clamped to `[0, max_dt]`; a non-finite `dt` counts as 0.
    #[must_use]
    pub fn step(&self, prior: &KinematicState, controls: &DriverControls, dt: f64) -> EngineOutput {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.params.max_dt)
        } else {
            0.0
        };
        let throttle = if controls.engine_on { controls.throttle } else { 0.0 };

        let speed = self.update_speed(prior, controls, throttle, dt);
        let rotation = self.rotational_state(speed, prior.gear, throttle, controls.engine_on);
        let heading = self.update_heading(prior.heading, controls.steer, speed, dt);

        let signed_speed = if controls.reverse { -speed } else { speed };
        let x = prior.x + signed_speed * heading.sin() * dt;
        let y = prior.y + signed_speed * heading.cos() * dt;

        EngineOutput {
            throttle,
            brake: controls.brake,
            steer: controls.steer,
            reverse: controls.reverse,
            speed,
            heading,
            x,
            y,
            rpm: rotation.rpm,
            power: rotation.power,
            torque: rotation.torque,
        }
    }

    fn update_speed(
        &self,
        prior: &KinematicState,
        controls: &DriverControls,
        throttle: f64,
        dt: f64,
    ) -> f64 {
        let p = &self.params;
        let speed = prior.speed.max(0.0);

        if !controls.engine_on {
            (speed - p.engine_off_decel * dt).max(0.0)
        } else if controls.brake > 0.0 {
            (speed - p.brake_decel * dt).max(0.0)
        } else if prior.fuel > 0.0 && throttle > 0.0 {
            let accelerated = speed + throttle * p.accel_per_throttle * dt;
            let resistance =
                (p.rolling_resistance + p.drag_force) * accelerated / p.resistance_divisor;
            let cap = if controls.reverse {
                p.max_reverse_speed
            } else {
                p.max_forward_speed
            };
            (accelerated - resistance * dt).clamp(0.0, cap)
        } else {
            (speed - p.coast_decel * dt).max(0.0)
        }
    }

    /// Ratio of `gear`, or `None` for neutral and anything outside the set.
    #[must_use]
    pub fn gear_ratio(&self, gear: i32) -> Option<f64> {
        match gear {
            gear::REVERSE => Some(self.params.reverse_ratio),
            g if g >= gear::FIRST => usize::try_from(g - 1)
                .ok()
                .and_then(|i| self.params.gear_ratios.get(i).copied()),
            _ => None,
        }
    }

    /// Fraction of peak torque available at `rpm`.
    ///
    /// Rises linearly to 1 at the peak, falls linearly to 0 at redline.
    #[must_use]
    pub fn torque_factor(&self, rpm: f64) -> f64 {
        let p = &self.params;
        let factor = if rpm <= p.peak_rpm {
            rpm / p.peak_rpm
        } else {
            (p.max_rpm - rpm) / (p.max_rpm - p.peak_rpm)
        };
        factor.max(0.0)
    }

    /// Rpm, torque and power for the given speed and gear.
    #[must_use]
    pub fn rotational_state(&self, speed: f64, gear: i32, throttle: f64, engine_on: bool) -> RotationalState {
        let p = &self.params;
        if !engine_on {
            return RotationalState::default();
        }
        let Some(ratio) = self.gear_ratio(gear) else {
            return RotationalState {
                rpm: p.idle_rpm,
                ..RotationalState::default()
            };
        };

        let rpm = if speed > p.moving_threshold {
            speed * 60.0 * ratio * p.final_drive / (2.0 * PI * p.wheel_radius)
        } else {
            p.idle_rpm
        }
        .clamp(p.idle_rpm, p.max_rpm);

        let torque = p.peak_torque * self.torque_factor(rpm) * throttle;
        let power = (torque * rpm * 2.0 * PI / 60.0).min(p.max_power);
        RotationalState { rpm, torque, power }
    }

    fn update_heading(&self, heading: f64, steer: f64, speed: f64, dt: f64) -> f64 {
        let p = &self.params;
        if speed.abs() <= p.moving_threshold {
            return heading;
        }
        if steer != 0.0 {
            return wrap_heading(heading + steer * p.steering_rate() * dt);
        }
        if heading.abs() <= p.heading_deadzone() {
            return 0.0;
        }
        let correction = p.centering_rate() * dt;
        if heading.abs() <= correction {
            0.0
        } else {
            heading - correction.copysign(heading)
        }
    }
}
