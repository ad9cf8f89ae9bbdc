//! # Transmission State Machine
//!
//! Picks the next gear from speed, rpm and driver intent.
//!
//! ## States
//!
//! - **REVERSE (-1)**: only engaged at (almost) standstill.
//! - **NEUTRAL (0)**: initial state, and the fallback for anything invalid.
//! - **1..max_gear**: forward gears, shifted with hysteresis and a cooldown.
//!
//! ## Precedence
//!
//! Reverse request, standstill launch, gear validation, cooldown, upshift,
//! downshift, hold. The first rule that applies decides.

use std::fmt;
use std::time::Duration;

use drivetrain_core::{gear, TransmissionParams};

/// What the transmission is told each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransmissionInput {
    /// Speed in m/s.
    pub speed: f64,
    /// Gear currently engaged.
    pub gear: i32,
    /// Engine speed.
    pub rpm: f64,
    /// Driver wants reverse.
    pub reverse: bool,
    /// Throttle position.
    pub throttle: f64,
}

/// Why a gear was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftReason {
    /// Reverse requested at standstill.
    ReverseEngaged,
    /// Reverse requested while rolling.
    ReverseBlocked,
    /// Standstill with launch throttle.
    Launch,
    /// Standstill without launch throttle.
    Idle,
    /// Received gear outside the valid set.
    InvalidGear,
    /// Inside the cooldown window.
    Cooldown,
    /// Rpm above the upshift threshold.
    Upshift,
    /// Rpm below the downshift threshold.
    Downshift,
    /// Nothing to do.
    Hold,
}

impl fmt::Display for ShiftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReverseEngaged => "reverse engaged",
            Self::ReverseBlocked => "reverse blocked while rolling",
            Self::Launch => "launch",
            Self::Idle => "idle",
            Self::InvalidGear => "invalid gear",
            Self::Cooldown => "cooldown",
            Self::Upshift => "upshift",
            Self::Downshift => "downshift",
            Self::Hold => "hold",
        })
    }
}

/// A gear choice and the rule that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GearDecision {
    /// Gear to engage.
    pub gear: i32,
    /// Rule that decided.
    pub reason: ShiftReason,
}

impl GearDecision {
    const fn new(gear: i32, reason: ShiftReason) -> Self {
        Self { gear, reason }
    }
}

/// Gear-selection state machine.
///
/// The only state carried between calls is the time of the last up- or
/// downshift. Time is passed in so callers choose the clock.
#[derive(Clone, Debug)]
pub struct TransmissionModel {
    params: TransmissionParams,
    last_shift: Option<Duration>,
}

impl TransmissionModel {
    /// Creates a model that has never shifted.
    #[must_use]
    pub fn new(params: TransmissionParams) -> Self {
        Self {
            params,
            last_shift: None,
        }
    }

    /// Decides the next gear at monotonic time `now`.
    pub fn decide(&mut self, input: &TransmissionInput, now: Duration) -> GearDecision {
        let p = &self.params;

        if input.reverse {
            return if input.speed.abs() < p.reverse_engage_speed {
                GearDecision::new(gear::REVERSE, ShiftReason::ReverseEngaged)
            } else {
                GearDecision::new(gear::NEUTRAL, ShiftReason::ReverseBlocked)
            };
        }

        if input.speed < p.stationary_speed {
            return if input.rpm >= p.idle_rpm && input.throttle > p.launch_throttle {
                GearDecision::new(gear::FIRST, ShiftReason::Launch)
            } else {
                GearDecision::new(gear::NEUTRAL, ShiftReason::Idle)
            };
        }

        if !gear::is_valid(input.gear) {
            return GearDecision::new(gear::NEUTRAL, ShiftReason::InvalidGear);
        }

        if self.in_cooldown(now) {
            return GearDecision::new(input.gear, ShiftReason::Cooldown);
        }

        if input.gear >= gear::FIRST && input.gear < p.max_gear && input.rpm > p.upshift_rpm {
            self.last_shift = Some(now);
            return GearDecision::new(input.gear + 1, ShiftReason::Upshift);
        }

        if input.gear > gear::FIRST && input.rpm < p.downshift_rpm {
            self.last_shift = Some(now);
            return GearDecision::new(input.gear - 1, ShiftReason::Downshift);
        }

        GearDecision::new(input.gear, ShiftReason::Hold)
    }

    fn in_cooldown(&self, now: Duration) -> bool {
        self.last_shift
            .is_some_and(|last| now.saturating_sub(last) < self.params.cooldown())
    }
}
