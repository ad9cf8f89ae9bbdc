//! Transmission actor.

use std::ops::ControlFlow;
use std::time::Instant;

use drivetrain_core::TransmissionParams;
use drivetrain_models::TransmissionModel;

use super::Subsystem;
use crate::protocol::{Role, TransmissionReply, TransmissionRequest};

/// Serves gear decisions, timing the cooldown on a monotonic clock.
#[derive(Debug)]
pub struct TransmissionActor {
    model: TransmissionModel,
    epoch: Instant,
}

impl TransmissionActor {
    /// Creates a transmission actor that has never shifted.
    #[must_use]
    pub fn new(params: TransmissionParams) -> Self {
        Self {
            model: TransmissionModel::new(params),
            epoch: Instant::now(),
        }
    }
}

impl Subsystem for TransmissionActor {
    const ROLE: Role = Role::Transmission;
    type Request = TransmissionRequest;
    type Reply = TransmissionReply;

    fn handle(&mut self, request: &TransmissionRequest) -> ControlFlow<(), TransmissionReply> {
        let input = request.to_input();
        let decision = self.model.decide(&input, self.epoch.elapsed());

        if decision.gear != input.gear {
            tracing::info!(
                from = input.gear,
                to = decision.gear,
                reason = %decision.reason,
                rpm = input.rpm,
                speed = input.speed,
                "gear change"
            );
        }

        ControlFlow::Continue(TransmissionReply::new(decision.gear))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(speed: f64, gear: i32, rpm: f64, throttle: f64) -> TransmissionRequest {
        TransmissionRequest {
            role: Role::Transmission.tag(),
            speed,
            gear,
            rpm,
            throttle,
            ..TransmissionRequest::default()
        }
    }

    fn gear_of(flow: ControlFlow<(), TransmissionReply>) -> i32 {
        match flow {
            ControlFlow::Continue(reply) => reply.updated_gear,
            ControlFlow::Break(()) => panic!("transmission never stops"),
        }
    }

    #[test]
    fn test_launch_then_upshift() {
        let mut actor = TransmissionActor::new(TransmissionParams::default());
        assert_eq!(gear_of(actor.handle(&request(0.0, 0, 900.0, 0.2))), 1);
        assert_eq!(gear_of(actor.handle(&request(10.0, 3, 4000.0, 0.5))), 4);
    }

    #[test]
    fn test_cooldown_holds_second_shift() {
        let mut actor = TransmissionActor::new(TransmissionParams {
            cooldown_ms: 60_000,
            ..TransmissionParams::default()
        });
        assert_eq!(gear_of(actor.handle(&request(10.0, 2, 4000.0, 0.5))), 3);
        assert_eq!(gear_of(actor.handle(&request(12.0, 3, 4000.0, 0.5))), 3);
    }

    #[test]
    fn test_reply_carries_role() {
        let mut actor = TransmissionActor::new(TransmissionParams::default());
        match actor.handle(&request(0.0, 0, 0.0, 0.0)) {
            ControlFlow::Continue(reply) => {
                assert_eq!(reply.role, 2);
                assert_eq!(reply.updated_gear, 0);
            }
            ControlFlow::Break(()) => panic!("transmission never stops"),
        }
    }
}
