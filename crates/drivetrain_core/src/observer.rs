//! # Trip Computer
//!
//! Derived readings for passive observers of the published state.
//!
//! The trip computer never touches the store. It is fed snapshots at the
//! observer's own cadence and turns them into a status line.

use std::fmt;

use crate::state::{gear, VehicleState};

/// Metres per second to kilometres per hour.
pub const MPS_TO_KMPH: f64 = 3.6;

/// Low-fuel warning level, percent of tank.
pub const LOW_FUEL_PERCENT: f64 = 10.0;

/// Direction the vehicle is set up to travel in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveMode {
    /// Reverse selected.
    Reverse,
    /// Forward, in neutral.
    Neutral,
    /// Forward, in gear.
    Drive,
}

impl DriveMode {
    /// Mode for a published state.
    #[must_use]
    pub fn of(state: &VehicleState) -> Self {
        if state.reverse {
            Self::Reverse
        } else if state.gear == gear::NEUTRAL {
            Self::Neutral
        } else {
            Self::Drive
        }
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reverse => "REVERSE",
            Self::Neutral => "NEUTRAL",
            Self::Drive => "DRIVE",
        })
    }
}

/// Fuel warning shown by observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuelWarning {
    /// Tank empty.
    Empty,
    /// Below [`LOW_FUEL_PERCENT`].
    Low,
}

impl fmt::Display for FuelWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "NO FUEL",
            Self::Low => "LOW FUEL",
        })
    }
}

/// One observation, ready to print.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TripReport {
    /// The observed state.
    pub state: VehicleState,
    /// Speed in km/h.
    pub speed_kmph: f64,
    /// Distance covered since the first observation, meters.
    pub distance: f64,
    /// Average speed since the first observation, km/h.
    pub avg_speed_kmph: f64,
    /// Fuel as a percentage of the tank.
    pub fuel_percent: f64,
    /// Drive mode.
    pub mode: DriveMode,
    /// Speed above the overspeed threshold.
    pub overspeed: bool,
    /// Fuel warning, if any.
    pub fuel_warning: Option<FuelWarning>,
}

impl fmt::Display for TripReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.state;
        write!(
            f,
            "{:6.2} m/s ({:6.2} km/h) | gear {:2} {:7} | rpm {:4.0} | thr {:.2} brk {:.2} str {:+.2} | \
             fuel {:6.2} L ({:5.1}%) | pwr {:8.1} W trq {:5.1} Nm | pos ({:.2}, {:.2}) hdg {:+.1} deg | \
             dist {:.2} m avg {:.2} km/h",
            s.speed,
            self.speed_kmph,
            s.gear,
            self.mode,
            s.rpm,
            s.throttle,
            s.brake,
            s.steer,
            s.fuel,
            self.fuel_percent,
            s.power,
            s.torque,
            s.x,
            s.y,
            s.heading.to_degrees(),
            self.distance,
            self.avg_speed_kmph,
        )?;
        if self.overspeed {
            f.write_str(" | OVERSPEED WARNING!")?;
        }
        if let Some(warning) = self.fuel_warning {
            write!(f, " | {warning}")?;
        }
        Ok(())
    }
}

/// Accumulates distance and average speed across observations.
#[derive(Clone, Debug)]
pub struct TripComputer {
    overspeed_kmph: f64,
    tank_capacity: f64,
    distance: f64,
    elapsed: f64,
}

impl TripComputer {
    /// Creates a trip computer with the given warning thresholds.
    #[must_use]
    pub fn new(overspeed_kmph: f64, tank_capacity: f64) -> Self {
        Self {
            overspeed_kmph,
            tank_capacity,
            distance: 0.0,
            elapsed: 0.0,
        }
    }

    /// Feeds one snapshot observed `dt` seconds after the previous one.
    pub fn observe(&mut self, state: &VehicleState, dt: f64) -> TripReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.distance += state.speed.abs() * dt;
        self.elapsed += dt;

        let speed_kmph = state.speed * MPS_TO_KMPH;
        let avg_speed_kmph = if self.elapsed > 0.0 {
            self.distance / self.elapsed * MPS_TO_KMPH
        } else {
            0.0
        };
        let fuel_percent = state.fuel / self.tank_capacity * 100.0;
        let fuel_warning = if state.fuel <= 0.0 {
            Some(FuelWarning::Empty)
        } else if fuel_percent < LOW_FUEL_PERCENT {
            Some(FuelWarning::Low)
        } else {
            None
        };

        TripReport {
            state: *state,
            speed_kmph,
            distance: self.distance,
            avg_speed_kmph,
            fuel_percent,
            mode: DriveMode::of(state),
            overspeed: speed_kmph > self.overspeed_kmph,
            fuel_warning,
        }
    }

    /// Total distance so far, meters.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(speed: f64, gear: i32, fuel: f64) -> VehicleState {
        VehicleState {
            speed,
            gear,
            fuel,
            ..VehicleState::initial()
        }
    }

    #[test]
    fn test_distance_and_average() {
        let mut trip = TripComputer::new(90.0, 100.0);
        trip.observe(&state(10.0, 2, 80.0), 1.0);
        let report = trip.observe(&state(20.0, 3, 80.0), 1.0);

        assert_eq!(report.distance, 30.0);
        assert!((report.avg_speed_kmph - 15.0 * 3.6).abs() < 1e-9);
        assert_eq!(trip.distance(), 30.0);
    }

    #[test]
    fn test_first_observation_without_elapsed_time() {
        let mut trip = TripComputer::new(90.0, 100.0);
        let report = trip.observe(&state(5.0, 1, 100.0), 0.0);
        assert_eq!(report.avg_speed_kmph, 0.0);
        assert_eq!(report.distance, 0.0);
    }

    #[test]
    fn test_drive_modes() {
        let mut reversing = state(1.0, -1, 50.0);
        reversing.reverse = true;
        assert_eq!(DriveMode::of(&reversing), DriveMode::Reverse);
        assert_eq!(DriveMode::of(&state(0.0, 0, 50.0)), DriveMode::Neutral);
        assert_eq!(DriveMode::of(&state(3.0, 2, 50.0)), DriveMode::Drive);
        assert_eq!(DriveMode::Reverse.to_string(), "REVERSE");
    }

    #[test]
    fn test_warnings() {
        let mut trip = TripComputer::new(90.0, 100.0);

        let fast = trip.observe(&state(26.0, 5, 50.0), 0.1);
        assert!(fast.overspeed);
        assert_eq!(fast.fuel_warning, None);

        let low = trip.observe(&state(10.0, 3, 9.5), 0.1);
        assert!(!low.overspeed);
        assert_eq!(low.fuel_warning, Some(FuelWarning::Low));

        let empty = trip.observe(&state(0.0, 0, 0.0), 0.1);
        assert_eq!(empty.fuel_warning, Some(FuelWarning::Empty));
        assert!(empty.to_string().ends_with("NO FUEL"));
    }
}
