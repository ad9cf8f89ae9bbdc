//! # Simulation Configuration
//!
//! Every tunable of the simulation, loaded once at startup from TOML.
//!
//! All sections default to the reference constants, so an empty file (or no
//! file at all) is a valid configuration:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:9734"
//! tick_period_ms = 16.6
//!
//! [transmission]
//! upshift_rpm = 3500.0
//! cooldown_ms = 500
//! ```

use std::f64::consts::PI;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::state::limits;

/// Default TCP port of the orchestrator.
pub const DEFAULT_PORT: u16 = 9734;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Orchestrator networking and pacing.
    pub server: ServerSettings,
    /// Shared segment location.
    pub segment: SegmentSettings,
    /// Engine/drivetrain physics.
    pub engine: EngineParams,
    /// Driver-control shaping.
    pub controls: ControlParams,
    /// Gear selection.
    pub transmission: TransmissionParams,
    /// Fuel integration.
    pub fuel: FuelParams,
    /// Observer cadence and warnings.
    pub monitor: MonitorSettings,
}

impl SimConfig {
    /// Parses and validates a configuration from a TOML string.
    pub fn from_toml_str(source: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> CoreResult<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Rejects values the models cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        fn ensure(ok: bool, what: &str) -> CoreResult<()> {
            if ok {
                Ok(())
            } else {
                Err(CoreError::InvalidConfig(what.to_string()))
            }
        }

        ensure(
            self.server.tick_period_ms.is_finite() && self.server.tick_period_ms > 0.0,
            "server.tick_period_ms must be positive",
        )?;

        let engine = &self.engine;
        ensure(
            engine.idle_rpm > 0.0 && engine.idle_rpm < engine.peak_rpm && engine.peak_rpm < engine.max_rpm,
            "engine rpm must satisfy 0 < idle_rpm < peak_rpm < max_rpm",
        )?;
        ensure(
            engine.gear_ratios.len() == limits_top_gear(),
            "engine.gear_ratios must list one ratio per forward gear",
        )?;
        ensure(
            engine.gear_ratios.iter().all(|r| *r > 0.0) && engine.reverse_ratio > 0.0,
            "gear ratios must be positive",
        )?;
        ensure(
            engine.wheel_radius > 0.0 && engine.final_drive > 0.0,
            "engine.wheel_radius and engine.final_drive must be positive",
        )?;
        ensure(engine.resistance_divisor > 0.0, "engine.resistance_divisor must be positive")?;
        ensure(engine.max_dt > 0.0, "engine.max_dt must be positive")?;

        let transmission = &self.transmission;
        ensure(
            transmission.downshift_rpm < transmission.upshift_rpm,
            "transmission.downshift_rpm must be below upshift_rpm",
        )?;
        ensure(
            (1..=crate::state::gear::TOP).contains(&transmission.max_gear),
            "transmission.max_gear must be a forward gear",
        )?;

        let fuel = &self.fuel;
        ensure(fuel.dt > 0.0, "fuel.dt must be positive")?;
        ensure(
            fuel.energy_density_j_per_l > 0.0,
            "fuel.energy_density_j_per_l must be positive",
        )?;
        ensure(
            fuel.tank_capacity > 0.0 && fuel.tank_capacity <= limits::FUEL_CAPACITY,
            "fuel.tank_capacity must be within the canonical tank",
        )?;
        ensure(
            fuel.low_threshold > 0.0 && fuel.low_threshold < fuel.tank_capacity,
            "fuel.low_threshold must lie inside the tank",
        )?;
        Ok(())
    }
}

const fn limits_top_gear() -> usize {
    crate::state::gear::TOP as usize
}

/// Orchestrator networking and pacing.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Address the orchestrator listens on.
    pub bind_address: SocketAddr,
    /// Address subsystem actors connect to.
    pub connect_address: SocketAddr,
    /// Nominal tick period in milliseconds.
    pub tick_period_ms: f64,
    /// Bound on reading the role tag from a new connection.
    pub handshake_timeout_ms: u64,
    /// Sleep between polls of the cancellable accept loop.
    pub accept_poll_ms: u64,
}

impl ServerSettings {
    /// Nominal tick period.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.tick_period_ms / 1000.0)
    }

    /// Role-tag read timeout.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Accept-loop poll interval.
    #[must_use]
    pub const fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            connect_address: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            tick_period_ms: 16.6,
            handshake_timeout_ms: 5000,
            accept_poll_ms: 20,
        }
    }
}

/// Shared segment location.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentSettings {
    /// Backing file of the named segment.
    pub path: PathBuf,
    /// Remove the backing file when the orchestrator exits.
    pub unlink_on_exit: bool,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/shm/drivetrain_sim_shm"),
            unlink_on_exit: true,
        }
    }
}

/// Engine/drivetrain physics constants.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineParams {
    /// Idle rpm of a running engine.
    pub idle_rpm: f64,
    /// Redline.
    pub max_rpm: f64,
    /// Rpm of peak torque.
    pub peak_rpm: f64,
    /// Peak torque in N·m.
    pub peak_torque: f64,
    /// Power cap in watts.
    pub max_power: f64,
    /// Ratios of gears 1..5.
    pub gear_ratios: Vec<f64>,
    /// Ratio of reverse gear.
    pub reverse_ratio: f64,
    /// Final-drive ratio.
    pub final_drive: f64,
    /// Wheel radius in meters.
    pub wheel_radius: f64,
    /// Deceleration with the engine off (m/s²).
    pub engine_off_decel: f64,
    /// Deceleration while braking (m/s²).
    pub brake_decel: f64,
    /// Deceleration while coasting (m/s²).
    pub coast_decel: f64,
    /// Acceleration at full throttle (m/s²).
    pub accel_per_throttle: f64,
    /// Rolling resistance term.
    pub rolling_resistance: f64,
    /// Aerodynamic drag term.
    pub drag_force: f64,
    /// Divisor turning the resistance terms into a deceleration per m/s.
    pub resistance_divisor: f64,
    /// Forward speed cap (m/s).
    pub max_forward_speed: f64,
    /// Reverse speed cap (m/s).
    pub max_reverse_speed: f64,
    /// Below this speed the car counts as stationary for rpm and steering.
    pub moving_threshold: f64,
    /// Heading change at full lock, degrees per second.
    pub steering_rate_deg: f64,
    /// Heading relaxation toward zero, degrees per second.
    pub centering_rate_deg: f64,
    /// Heading snaps to zero inside this band, degrees.
    pub heading_deadzone_deg: f64,
    /// Upper bound on a measured tick duration, seconds.
    pub max_dt: f64,
}

impl EngineParams {
    /// Steering rate in rad/s.
    #[must_use]
    pub fn steering_rate(&self) -> f64 {
        self.steering_rate_deg * PI / 180.0
    }

    /// Centering rate in rad/s.
    #[must_use]
    pub fn centering_rate(&self) -> f64 {
        self.centering_rate_deg * PI / 180.0
    }

    /// Heading deadzone in radians.
    #[must_use]
    pub fn heading_deadzone(&self) -> f64 {
        self.heading_deadzone_deg * PI / 180.0
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            idle_rpm: 900.0,
            max_rpm: 7000.0,
            peak_rpm: 3500.0,
            peak_torque: 250.0,
            max_power: limits::POWER_MAX,
            gear_ratios: vec![3.5, 2.0, 1.5, 1.0, 0.8],
            reverse_ratio: 3.2,
            final_drive: 3.5,
            wheel_radius: 0.3,
            engine_off_decel: 3.0,
            brake_decel: 30.0,
            coast_decel: 2.0,
            accel_per_throttle: 10.0,
            rolling_resistance: 100.0,
            drag_force: 400.0,
            resistance_divisor: 5000.0,
            max_forward_speed: 100.0,
            max_reverse_speed: 5.5,
            moving_threshold: 0.1,
            steering_rate_deg: 20.0,
            centering_rate_deg: 33.0,
            heading_deadzone_deg: 0.5,
            max_dt: 0.1,
        }
    }
}

/// Driver-control shaping constants.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ControlParams {
    /// Throttle gained per tick while accelerating.
    pub throttle_step: f64,
    /// Throttle lost per tick once released.
    pub throttle_release_step: f64,
    /// Steering gained per tick while a direction is held.
    pub steer_step: f64,
    /// Steering lost per tick while returning to centre.
    pub steer_return_step: f64,
    /// Steering snaps to centre inside this band.
    pub steer_snap: f64,
    /// Steering input is ignored below this speed.
    pub steer_min_speed: f64,
    /// Reverse can only be toggled below this speed.
    pub reverse_toggle_speed: f64,
    /// Polls a key press stays held for, when driving from a keyboard.
    pub hold_ticks: u32,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            throttle_step: 0.05,
            throttle_release_step: 0.10,
            steer_step: 0.10,
            steer_return_step: 0.15,
            steer_snap: 0.01,
            steer_min_speed: 0.1,
            reverse_toggle_speed: 0.1,
            hold_ticks: 6,
        }
    }
}

/// Gear-selection constants.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransmissionParams {
    /// Minimum rpm for a launch into first gear.
    pub idle_rpm: f64,
    /// Upshift above this rpm.
    pub upshift_rpm: f64,
    /// Downshift below this rpm.
    pub downshift_rpm: f64,
    /// Highest forward gear the box will select.
    pub max_gear: i32,
    /// Below this speed the car counts as stationary.
    pub stationary_speed: f64,
    /// Reverse engages only below this speed.
    pub reverse_engage_speed: f64,
    /// Throttle needed for a launch.
    pub launch_throttle: f64,
    /// Minimum time between gear changes, milliseconds.
    pub cooldown_ms: u64,
}

impl TransmissionParams {
    /// Minimum time between gear changes.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for TransmissionParams {
    fn default() -> Self {
        Self {
            idle_rpm: 900.0,
            upshift_rpm: 3500.0,
            downshift_rpm: 1500.0,
            max_gear: crate::state::gear::TOP,
            stationary_speed: 0.1,
            reverse_engage_speed: 0.2,
            launch_throttle: 0.05,
            cooldown_ms: 500,
        }
    }
}

/// Fuel integration constants.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FuelParams {
    /// Energy content of fuel, J/L.
    pub energy_density_j_per_l: f64,
    /// Fraction of fuel energy turned into engine power.
    pub engine_efficiency: f64,
    /// Fixed integration step, seconds.
    pub dt: f64,
    /// Tank capacity, litres.
    pub tank_capacity: f64,
    /// Low-fuel warning level, litres.
    pub low_threshold: f64,
}

impl Default for FuelParams {
    fn default() -> Self {
        Self {
            energy_density_j_per_l: 34_000_000.0,
            engine_efficiency: 0.30,
            dt: 0.016,
            tank_capacity: limits::FUEL_CAPACITY,
            low_threshold: 10.0,
        }
    }
}

/// Observer settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSettings {
    /// Poll interval in milliseconds.
    pub poll_ms: u64,
    /// Overspeed warning threshold, km/h.
    pub overspeed_kmph: f64,
}

impl MonitorSettings {
    /// Poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            overspeed_kmph: 90.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.server.bind_address.port(), DEFAULT_PORT);
        assert_eq!(config.engine.gear_ratios.len(), 5);
    }

    #[test]
    fn test_partial_override() {
        let config = SimConfig::from_toml_str(
            r#"
            [server]
            tick_period_ms = 10.0

            [transmission]
            cooldown_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.server.tick_period(), Duration::from_millis(10));
        assert_eq!(config.transmission.cooldown(), Duration::from_millis(250));
        assert_eq!(config.transmission.upshift_rpm, 3500.0);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = SimConfig::from_toml_str("[server]\nturbo = true\n");
        assert!(matches!(result, Err(CoreError::ConfigParse(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = SimConfig::from_toml_str("[transmission]\ndownshift_rpm = 4000.0\n");
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));

        let result = SimConfig::from_toml_str("[engine]\ngear_ratios = [3.5, 2.0]\n");
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));

        let result = SimConfig::from_toml_str("[fuel]\nlow_threshold = 150.0\n");
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = SimConfig::load("/nonexistent/drivetrain.toml");
        assert!(matches!(result, Err(CoreError::ConfigRead { .. })));
    }

    #[test]
    fn test_angle_conversions() {
        let engine = EngineParams::default();
        assert!((engine.steering_rate() - 20.0_f64.to_radians()).abs() < 1e-12);
        assert!((engine.heading_deadzone() - 0.5_f64.to_radians()).abs() < 1e-12);
    }
}
