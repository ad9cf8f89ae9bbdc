//! # Driver Controls
//!
//! Per-tick control input and the shaping that turns it into pedal and
//! steering positions.
//!
//! ## Flow
//!
//! ```text
//! ControlSource::poll ──► ControlInput ──► DriverControls::apply ──► throttle/brake/steer
//! ```
//!
//! A [`ControlSource`] owns everything about *how* input arrives (scripts,
//! keyboards, hold timers). [`DriverControls`] only sees one
//! [`ControlInput`] per tick.

use crossbeam_channel::{Receiver, TryRecvError};
use drivetrain_core::ControlParams;

/// Steering direction requested for this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SteerIntent {
    /// No steering input; the wheel returns to centre.
    #[default]
    Centre,
    /// Steer left (negative).
    Left,
    /// Steer right (positive).
    Right,
}

/// Driver intent for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlInput {
    /// Accelerator held.
    pub accelerate: bool,
    /// Brake held.
    pub brake: bool,
    /// Steering direction held.
    pub steer: SteerIntent,
    /// Request to flip the reverse selector.
    pub toggle_reverse: bool,
    /// Request to start or stop the engine.
    pub toggle_engine: bool,
}

impl ControlInput {
    /// No input at all.
    pub const IDLE: Self = Self {
        accelerate: false,
        brake: false,
        steer: SteerIntent::Centre,
        toggle_reverse: false,
        toggle_engine: false,
    };

    /// Accelerator held, nothing else.
    pub const ACCELERATE: Self = Self {
        accelerate: true,
        ..Self::IDLE
    };

    /// Brake held, nothing else.
    pub const BRAKE: Self = Self {
        brake: true,
        ..Self::IDLE
    };

    /// Engine toggle, nothing else.
    pub const TOGGLE_ENGINE: Self = Self {
        toggle_engine: true,
        ..Self::IDLE
    };

    /// Reverse toggle, nothing else.
    pub const TOGGLE_REVERSE: Self = Self {
        toggle_reverse: true,
        ..Self::IDLE
    };

    /// Returns `self` with the given steering direction.
    #[must_use]
    pub const fn steering(mut self, steer: SteerIntent) -> Self {
        self.steer = steer;
        self
    }
}

/// Pedal, wheel and switch positions carried across ticks by the engine actor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriverControls {
    /// Throttle position (0..1).
    pub throttle: f64,
    /// Brake position (0 or 1).
    pub brake: f64,
    /// Steering position (-1..1).
    pub steer: f64,
    /// Reverse selected.
    pub reverse: bool,
    /// Engine running.
    pub engine_on: bool,
}

impl DriverControls {
    /// Engine off, pedals up, wheel centred.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            throttle: 0.0,
            brake: 0.0,
            steer: 0.0,
            reverse: false,
            engine_on: false,
        }
    }

    /// Applies one tick of input.
    ///
    /// `speed` and `fuel` are the values the orchestrator sent with this
    /// tick's request.
    pub fn apply(&mut self, input: &ControlInput, speed: f64, fuel: f64, params: &ControlParams) {
        if input.toggle_engine {
            self.engine_on = !self.engine_on;
            if !self.engine_on {
                self.throttle = 0.0;
            }
        }

        if input.toggle_reverse && speed < params.reverse_toggle_speed {
            self.reverse = !self.reverse;
        }

        if input.accelerate && self.engine_on && fuel > 0.0 {
            self.throttle = (self.throttle + params.throttle_step).min(1.0);
            self.brake = 0.0;
        } else if self.throttle > 0.0 {
            self.throttle = (self.throttle - params.throttle_release_step).max(0.0);
        }

        if input.brake {
            self.brake = 1.0;
            self.throttle = 0.0;
        } else {
            self.brake = 0.0;
        }

        match input.steer {
            SteerIntent::Left if speed > params.steer_min_speed => {
                self.steer = (self.steer - params.steer_step).max(-1.0);
            }
            SteerIntent::Right if speed > params.steer_min_speed => {
                self.steer = (self.steer + params.steer_step).min(1.0);
            }
            SteerIntent::Left | SteerIntent::Right => {}
            SteerIntent::Centre => self.return_to_centre(params),
        }
    }

    fn return_to_centre(&mut self, params: &ControlParams) {
        if self.steer > params.steer_snap {
            self.steer = (self.steer - params.steer_return_step).max(0.0);
        } else if self.steer < -params.steer_snap {
            self.steer = (self.steer + params.steer_return_step).min(0.0);
        } else {
            self.steer = 0.0;
        }
    }
}

/// Supplies one [`ControlInput`] per engine tick.
pub trait ControlSource: Send {
    /// Returns this tick's input, or `None` once the driver has quit.
    fn poll(&mut self) -> Option<ControlInput>;
}

/// One entry of a [`ScriptedControls`] script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScriptStep {
    /// Input to emit.
    pub input: ControlInput,
    /// Number of polls to emit it for.
    pub ticks: u32,
}

impl ScriptStep {
    /// Creates a step.
    #[must_use]
    pub const fn new(input: ControlInput, ticks: u32) -> Self {
        Self { input, ticks }
    }
}

/// Plays back a fixed script of inputs.
#[derive(Clone, Debug)]
pub struct ScriptedControls {
    steps: Vec<ScriptStep>,
    index: usize,
    emitted: u32,
    loop_from: Option<usize>,
}

impl ScriptedControls {
    /// Plays `steps` once, then reports quit.
    #[must_use]
    pub fn once(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            index: 0,
            emitted: 0,
            loop_from: None,
        }
    }

    /// Plays `steps`, then repeats forever from step `loop_from`.
    #[must_use]
    pub fn looping(steps: Vec<ScriptStep>, loop_from: usize) -> Self {
        let loop_from = (loop_from < steps.len()).then_some(loop_from);
        Self {
            steps,
            index: 0,
            emitted: 0,
            loop_from,
        }
    }

    /// Starts the engine, then drives a repeating lap: pull away, turn,
    /// coast and brake to a stop.
    #[must_use]
    pub fn autopilot() -> Self {
        Self::looping(
            vec![
                ScriptStep::new(ControlInput::TOGGLE_ENGINE, 1),
                ScriptStep::new(ControlInput::ACCELERATE, 360),
                ScriptStep::new(ControlInput::ACCELERATE.steering(SteerIntent::Right), 45),
                ScriptStep::new(ControlInput::ACCELERATE, 180),
                ScriptStep::new(ControlInput::IDLE, 120),
                ScriptStep::new(ControlInput::BRAKE, 90),
                ScriptStep::new(ControlInput::IDLE, 30),
            ],
            1,
        )
    }
}

impl ControlSource for ScriptedControls {
    fn poll(&mut self) -> Option<ControlInput> {
        loop {
            let step = match self.steps.get(self.index) {
                Some(step) => *step,
                None => {
                    self.index = self.loop_from?;
                    if self.steps[self.index..].iter().all(|s| s.ticks == 0) {
                        return None;
                    }
                    continue;
                }
            };
            if self.emitted < step.ticks {
                self.emitted += 1;
                return Some(step.input);
            }
            self.index += 1;
            self.emitted = 0;
        }
    }
}

/// A key press reported by an input thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// Accelerator.
    Accelerate,
    /// Brake.
    Brake,
    /// Steer left.
    SteerLeft,
    /// Steer right.
    SteerRight,
    /// Reverse selector.
    ToggleReverse,
    /// Engine start/stop.
    ToggleEngine,
    /// Leave the simulation.
    Quit,
}

impl Key {
    /// Maps a typed character to a key, using the W/A/S/D layout.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'w' => Some(Self::Accelerate),
            's' => Some(Self::Brake),
            'a' => Some(Self::SteerLeft),
            'd' => Some(Self::SteerRight),
            'r' => Some(Self::ToggleReverse),
            'e' => Some(Self::ToggleEngine),
            'q' => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Turns discrete key presses into held controls.
///
/// A press keeps its control held for `hold_ticks` polls. Toggles fire once.
/// `Quit`, or the sending side going away, ends the drive.
#[derive(Debug)]
pub struct KeyboardControls {
    keys: Receiver<Key>,
    hold_ticks: u32,
    accelerate: u32,
    brake: u32,
    left: u32,
    right: u32,
}

impl KeyboardControls {
    /// Reads key presses from `keys`.
    #[must_use]
    pub fn new(keys: Receiver<Key>, hold_ticks: u32) -> Self {
        Self {
            keys,
            hold_ticks: hold_ticks.max(1),
            accelerate: 0,
            brake: 0,
            left: 0,
            right: 0,
        }
    }
}

impl ControlSource for KeyboardControls {
    fn poll(&mut self) -> Option<ControlInput> {
        let mut input = ControlInput::IDLE;
        loop {
            match self.keys.try_recv() {
                Ok(Key::Accelerate) => self.accelerate = self.hold_ticks,
                Ok(Key::Brake) => self.brake = self.hold_ticks,
                Ok(Key::SteerLeft) => {
                    self.left = self.hold_ticks;
                    self.right = 0;
                }
                Ok(Key::SteerRight) => {
                    self.right = self.hold_ticks;
                    self.left = 0;
                }
                Ok(Key::ToggleReverse) => input.toggle_reverse = true,
                Ok(Key::ToggleEngine) => input.toggle_engine = true,
                Ok(Key::Quit) | Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => break,
            }
        }

        input.accelerate = self.accelerate > 0;
        input.brake = self.brake > 0;
        input.steer = if self.left > 0 {
            SteerIntent::Left
        } else if self.right > 0 {
            SteerIntent::Right
        } else {
            SteerIntent::Centre
        };

        for counter in [&mut self.accelerate, &mut self.brake, &mut self.left, &mut self.right] {
            *counter = counter.saturating_sub(1);
        }
        Some(input)
    }
}
