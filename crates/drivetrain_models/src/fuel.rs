//! # Fuel Model
//!
//! Integrates fuel burn over a fixed step. Stateless: the current level
//! arrives with every request.

use drivetrain_core::FuelParams;

/// What the fuel model is told each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FuelInput {
    /// Throttle position.
    pub throttle: f64,
    /// Speed in m/s.
    pub speed: f64,
    /// Engine speed, truncated.
    pub rpm: i32,
    /// Engine power in watts.
    pub power: f64,
    /// Fuel before this tick, litres.
    pub current_fuel: f64,
}

/// New fuel level and its warning flags.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FuelDecision {
    /// Fuel after this tick, litres.
    pub fuel: f64,
    /// Litres burned this tick.
    pub burn: f64,
    /// Tank empty.
    pub no_fuel: bool,
    /// At or below the low threshold, not empty.
    pub low_fuel: bool,
    /// At or above capacity.
    pub full_fuel: bool,
}

/// Fixed-step fuel integrator.
#[derive(Clone, Debug, Default)]
pub struct FuelModel {
    params: FuelParams,
}

impl FuelModel {
    /// Creates a model with the given constants.
    #[must_use]
    pub fn new(params: FuelParams) -> Self {
        Self { params }
    }

    /// Litres burned by `power` watts over one step.
    #[inline]
    #[must_use]
    pub fn burn(&self, power: f64, current_fuel: f64) -> f64 {
        let p = &self.params;
        if power > 0.0 && p.engine_efficiency > 0.0 && current_fuel > 0.0 {
            power * p.dt / (p.engine_efficiency * p.energy_density_j_per_l)
        } else {
            0.0
        }
    }

    /// Integrates one step.
    ///
    /// Only the empty floor is applied here; the tank ceiling is enforced
    /// when the result is merged into the vehicle state.
    #[must_use]
    pub fn integrate(&self, input: &FuelInput) -> FuelDecision {
        let p = &self.params;
        let current = if input.current_fuel.is_finite() {
            input.current_fuel
        } else {
            0.0
        };
        let burn = self.burn(input.power, current);
        let fuel = (current - burn).max(0.0);

        FuelDecision {
            fuel,
            burn,
            no_fuel: fuel <= 0.0,
            low_fuel: fuel > 0.0 && fuel <= p.low_threshold,
            full_fuel: fuel >= p.tank_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model() -> FuelModel {
        FuelModel::new(FuelParams::default())
    }

    fn input(power: f64, current_fuel: f64) -> FuelInput {
        FuelInput {
            power,
            current_fuel,
            ..FuelInput::default()
        }
    }

    #[test]
    fn test_no_power_no_burn() {
        let decision = model().integrate(&input(0.0, 100.0));
        assert_eq!(decision.fuel, 100.0);
        assert_eq!(decision.burn, 0.0);
        assert!(decision.full_fuel);
        assert!(!decision.low_fuel);
        assert!(!decision.no_fuel);
    }

    #[test]
    fn test_burn_formula() {
        let decision = model().integrate(&input(150_000.0, 50.0));
        let expected = 150_000.0 * 0.016 / (0.30 * 34_000_000.0);
        assert!((decision.burn - expected).abs() < 1e-15);
        assert!((decision.fuel - (50.0 - expected)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_tank() {
        let decision = model().integrate(&input(1.0e12, 0.001));
        assert_eq!(decision.fuel, 0.0);
        assert!(decision.no_fuel);
        assert!(!decision.low_fuel);

        let dry = model().integrate(&input(50_000.0, 0.0));
        assert_eq!(dry.burn, 0.0);
        assert!(dry.no_fuel);
    }

    #[test]
    fn test_low_fuel_boundary() {
        assert!(model().integrate(&input(0.0, 10.0)).low_fuel);
        assert!(!model().integrate(&input(0.0, 10.5)).low_fuel);
    }

    #[test]
    fn test_overfull_tank_passes_through() {
        let decision = model().integrate(&input(0.0, 120.0));
        assert_eq!(decision.fuel, 120.0);
        assert!(decision.full_fuel);
        assert!(!decision.low_fuel);
    }

    #[test]
    fn test_non_finite_fuel_reads_as_empty() {
        let decision = model().integrate(&input(1000.0, f64::NAN));
        assert_eq!(decision.fuel, 0.0);
        assert!(decision.no_fuel);
    }

    proptest! {
        #[test]
        fn prop_fuel_range_and_flags(power in -1.0e6f64..1.0e9, current in 0.0f64..=100.0) {
            let decision = model().integrate(&input(power, current));
            prop_assert!((0.0..=100.0).contains(&decision.fuel));
            prop_assert_eq!(decision.no_fuel, decision.fuel == 0.0);
            prop_assert_eq!(decision.low_fuel, decision.fuel > 0.0 && decision.fuel <= 10.0);
            prop_assert!(!(decision.full_fuel && (decision.no_fuel || decision.low_fuel)));
            prop_assert!(decision.fuel <= current);
        }
    }
}
