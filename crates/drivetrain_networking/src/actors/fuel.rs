//! Fuel actor.

use std::ops::ControlFlow;

use drivetrain_core::FuelParams;
use drivetrain_models::FuelModel;

use super::Subsystem;
use crate::protocol::{FuelReply, FuelRequest, Role};

/// Serves fuel integration on a fixed step.
#[derive(Debug)]
pub struct FuelActor {
    model: FuelModel,
    warned_low: bool,
}

impl FuelActor {
    /// Creates a fuel actor.
    #[must_use]
    pub fn new(params: FuelParams) -> Self {
        Self {
            model: FuelModel::new(params),
            warned_low: false,
        }
    }
}

impl Subsystem for FuelActor {
    const ROLE: Role = Role::Fuel;
    type Request = FuelRequest;
    type Reply = FuelReply;

    fn handle(&mut self, request: &FuelRequest) -> ControlFlow<(), FuelReply> {
        let decision = self.model.integrate(&request.to_input());
        tracing::trace!(burn = decision.burn, fuel = decision.fuel, "fuel step");

        let warn = decision.low_fuel || decision.no_fuel;
        if warn && !self.warned_low {
            tracing::warn!(
                fuel = decision.fuel,
                empty = decision.no_fuel,
                "fuel running out"
            );
        }
        self.warned_low = warn;

        ControlFlow::Continue(FuelReply::from_decision(&decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(actor: &mut FuelActor, power: f64, current_fuel: f64) -> FuelReply {
        let request = FuelRequest {
            role: Role::Fuel.tag(),
            power,
            current_fuel,
            ..FuelRequest::default()
        };
        match actor.handle(&request) {
            ControlFlow::Continue(reply) => reply,
            ControlFlow::Break(()) => panic!("fuel never stops"),
        }
    }

    #[test]
    fn test_no_power_keeps_fuel() {
        let mut actor = FuelActor::new(FuelParams::default());
        let out = reply(&mut actor, 0.0, 100.0);
        assert_eq!(out.updated_fuel, 100.0);
        assert_eq!(out.full_fuel, 1);
        assert_eq!(out.no_fuel, 0);
        assert_eq!(out.low_fuel, 0);
    }

    #[test]
    fn test_burn_at_full_power() {
        let mut actor = FuelActor::new(FuelParams::default());
        let out = reply(&mut actor, 150_000.0, 50.0);
        let expected = 50.0 - 150_000.0 * 0.016 / (0.30 * 34_000_000.0);
        assert!((out.updated_fuel - expected).abs() < 1e-12);
        assert_eq!(out.full_fuel, 0);
    }

    #[test]
    fn test_overfull_reply_clamped_on_merge() {
        let mut actor = FuelActor::new(FuelParams::default());
        let out = reply(&mut actor, 0.0, 130.0);
        assert_eq!(out.updated_fuel, 130.0);
        assert_eq!(out.full_fuel, 1);

        let mut state = drivetrain_core::VehicleState::initial();
        state.merge(&out.to_delta());
        assert_eq!(state.fuel, 100.0);
    }

    #[test]
    fn test_flags_near_empty() {
        let mut actor = FuelActor::new(FuelParams::default());
        assert_eq!(reply(&mut actor, 0.0, 5.0).low_fuel, 1);

        let empty = reply(&mut actor, 150_000.0, 1e-6);
        assert_eq!(empty.updated_fuel, 0.0);
        assert_eq!(empty.no_fuel, 1);
        assert_eq!(empty.low_fuel, 0);
    }
}
