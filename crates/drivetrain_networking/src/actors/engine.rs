//! Engine actor: driver controls plus the engine/drivetrain model.

use std::ops::ControlFlow;
use std::time::Instant;

use drivetrain_core::{ControlParams, EngineParams};
use drivetrain_models::{ControlSource, DriverControls, EngineModel};

use super::Subsystem;
use crate::protocol::{EngineReply, EngineRequest, Role};

/// Where the engine actor gets each tick's duration from.
#[derive(Clone, Copy, Debug)]
pub enum EngineClock {
    /// Wall-clock time since the previous request.
    Measured {
        /// Time of the previous request, or of actor start.
        last: Instant,
    },
    /// A constant step in seconds.
    Fixed(f64),
}

impl EngineClock {
    /// A wall clock starting now.
    #[must_use]
    pub fn measured() -> Self {
        Self::Measured {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call. The model clamps the result.
    fn tick(&mut self) -> f64 {
        match self {
            Self::Measured { last } => {
                let now = Instant::now();
                let dt = now.duration_since(*last).as_secs_f64();
                *last = now;
                dt
            }
            Self::Fixed(dt) => *dt,
        }
    }
}

/// Serves engine requests from a control source.
pub struct EngineActor<C> {
    model: EngineModel,
    controls: DriverControls,
    control_params: ControlParams,
    source: C,
    clock: EngineClock,
}

impl<C: ControlSource> EngineActor<C> {
    /// Creates an engine actor with the engine off.
    pub fn new(
        params: EngineParams,
        control_params: ControlParams,
        source: C,
        clock: EngineClock,
    ) -> Self {
        Self {
            model: EngineModel::new(params),
            controls: DriverControls::new(),
            control_params,
            source,
            clock,
        }
    }

    /// Control positions after the last request.
    pub const fn controls(&self) -> &DriverControls {
        &self.controls
    }
}

impl<C: ControlSource> Subsystem for EngineActor<C> {
    const ROLE: Role = Role::Engine;
    type Request = EngineRequest;
    type Reply = EngineReply;

    fn handle(&mut self, request: &EngineRequest) -> ControlFlow<(), EngineReply> {
        let Some(input) = self.source.poll() else {
            tracing::info!("driver quit");
            return ControlFlow::Break(());
        };

        let was_on = self.controls.engine_on;
        self.controls
            .apply(&input, request.speed, request.fuel, &self.control_params);
        if self.controls.engine_on != was_on {
            tracing::info!(engine_on = self.controls.engine_on, "engine toggled");
        }

        let dt = self.clock.tick();
        let out = self.model.step(&request.kinematics(), &self.controls, dt);
        tracing::trace!(
            dt,
            speed = out.speed,
            rpm = out.rpm,
            power = out.power,
            "engine step"
        );

        ControlFlow::Continue(EngineReply::from_output(&out))
    }
}

impl<C> std::fmt::Debug for EngineActor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineActor")
            .field("controls", &self.controls)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivetrain_core::VehicleState;
    use drivetrain_models::{ControlInput, ScriptStep, ScriptedControls};

    fn actor(steps: Vec<ScriptStep>) -> EngineActor<ScriptedControls> {
        EngineActor::new(
            EngineParams::default(),
            ControlParams::default(),
            ScriptedControls::once(steps),
            EngineClock::Fixed(0.016),
        )
    }

    #[test]
    fn test_engine_off_idle_tick() {
        let mut engine = actor(vec![ScriptStep::new(ControlInput::IDLE, 1)]);
        let request = EngineRequest::from_state(&VehicleState::initial());

        let ControlFlow::Continue(reply) = engine.handle(&request) else {
            panic!("engine stopped early");
        };
        assert_eq!(reply.speed, 0.0);
        assert_eq!(reply.rpm, 0.0);
        assert_eq!(reply.torque, 0.0);
        assert_eq!(reply.power, 0.0);
        assert_eq!(reply.reverse, 0);

        assert_eq!(engine.handle(&request), ControlFlow::Break(()));
    }

    #[test]
    fn test_throttle_builds_after_start() {
        let mut engine = actor(vec![
            ScriptStep::new(ControlInput::TOGGLE_ENGINE, 1),
            ScriptStep::new(ControlInput::ACCELERATE, 10),
        ]);
        let mut state = VehicleState::initial();

        for _ in 0..11 {
            let ControlFlow::Continue(reply) = engine.handle(&EngineRequest::from_state(&state))
            else {
                panic!("engine stopped early");
            };
            state.merge(&reply.to_delta());
        }

        assert!(engine.controls().engine_on);
        assert!((engine.controls().throttle - 0.5).abs() < 1e-9);
        assert!(state.speed > 0.0);
        assert!(state.y > 0.0);
    }

    #[test]
    fn test_measured_clock_advances() {
        let mut clock = EngineClock::measured();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.tick() >= 0.002);
        assert!(clock.tick() < 0.002);
    }
}
