//! # Wire Records
//!
//! Every message exchanged between the orchestrator and a subsystem.
//!
//! ## Layout
//!
//! All records are `#[repr(C)]`, `Copy` and fixed-size, in host byte order,
//! with explicit padding so they can be sent with `bytemuck::bytes_of` and
//! received into a zeroed value. There is no length prefix: each side reads
//! exactly `SIZE` bytes for the record it expects.
//!
//! | Record | Direction | Size |
//! |---|---|---|
//! | role tag (`i32`) | subsystem → orchestrator, once | 4 |
//! | [`EngineRequest`] | orchestrator → engine | 48 |
//! | [`EngineReply`] | engine → orchestrator | 88 |
//! | [`TransmissionRequest`] | orchestrator → transmission | 48 |
//! | [`TransmissionReply`] | transmission → orchestrator | 8 |
//! | [`FuelRequest`] | orchestrator → fuel | 48 |
//! | [`FuelReply`] | fuel → orchestrator | 32 |

use std::fmt;
use std::io::{self, Read};

use bytemuck::{Pod, Zeroable};
use drivetrain_core::{StateDelta, VehicleState};
use drivetrain_models::{EngineOutput, FuelDecision, FuelInput, KinematicState, TransmissionInput};

/// Size of the role tag sent first on every session.
pub const ROLE_TAG_SIZE: usize = 4;

/// Identity of a subsystem session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Role {
    /// Engine/drivetrain model.
    Engine = 1,
    /// Transmission model.
    Transmission = 2,
    /// Fuel model.
    Fuel = 3,
}

impl Role {
    /// Every role, in tick order.
    pub const ALL: [Self; 3] = [Self::Engine, Self::Transmission, Self::Fuel];

    /// Wire value of this role.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> i32 {
        self as i32
    }

    /// Parses a wire value.
    #[must_use]
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(Self::Engine),
            2 => Some(Self::Transmission),
            3 => Some(Self::Fuel),
            _ => None,
        }
    }

    /// Position of this role in [`Role::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Engine => 0,
            Self::Transmission => 1,
            Self::Fuel => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Engine => "engine",
            Self::Transmission => "transmission",
            Self::Fuel => "fuel",
        })
    }
}

/// Reads the 4-byte role tag a subsystem sends when it connects.
pub fn read_role_tag(reader: &mut impl Read) -> io::Result<i32> {
    let mut tag = [0u8; ROLE_TAG_SIZE];
    reader.read_exact(&mut tag)?;
    Ok(i32::from_ne_bytes(tag))
}

#[inline]
const fn flag(value: bool) -> i32 {
    if value {
        1
    } else {
        0
    }
}

/// Orchestrator → engine.
///
/// Total size: 48 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct EngineRequest {
    /// Speed in m/s.
    pub speed: f64,
    /// Fuel in litres.
    pub fuel: f64,
    /// Current gear.
    pub gear: i32,
    /// Explicit padding.
    pub _padding: [u8; 4],
    /// Heading in radians.
    pub heading: f64,
    /// Position X.
    pub x: f64,
    /// Position Y.
    pub y: f64,
}

impl EngineRequest {
    /// Size in bytes.
    pub const SIZE: usize = 48;

    /// Builds the request from a state snapshot.
    #[must_use]
    pub fn from_state(state: &VehicleState) -> Self {
        Self {
            speed: state.speed,
            fuel: state.fuel,
            gear: state.gear,
            _padding: [0; 4],
            heading: state.heading,
            x: state.x,
            y: state.y,
        }
    }

    /// The prior kinematics carried by this request.
    #[must_use]
    pub fn kinematics(&self) -> KinematicState {
        KinematicState {
            speed: self.speed,
            fuel: self.fuel,
            gear: self.gear,
            heading: self.heading,
            x: self.x,
            y: self.y,
        }
    }
}

/// Engine → orchestrator.
///
/// Total size: 88 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct EngineReply {
    /// Throttle position.
    pub throttle: f64,
    /// Brake position.
    pub brake: f64,
    /// Steering position.
    pub steer: f64,
    /// Reverse selected (0/1).
    pub reverse: i32,
    /// Explicit padding.
    pub _padding: [u8; 4],
    /// Speed in m/s.
    pub speed: f64,
    /// Heading in radians.
    pub heading: f64,
    /// Position X.
    pub x: f64,
    /// Position Y.
    pub y: f64,
    /// Engine speed.
    pub rpm: f64,
    /// Engine power in watts.
    pub power: f64,
    /// Engine torque in N·m.
    pub torque: f64,
}

impl EngineReply {
    /// Size in bytes.
    pub const SIZE: usize = 88;

    /// Builds the reply from a model output.
    #[must_use]
    pub fn from_output(out: &EngineOutput) -> Self {
        Self {
            throttle: out.throttle,
            brake: out.brake,
            steer: out.steer,
            reverse: flag(out.reverse),
            _padding: [0; 4],
            speed: out.speed,
            heading: out.heading,
            x: out.x,
            y: out.y,
            rpm: out.rpm,
            power: out.power,
            torque: out.torque,
        }
    }

    /// The state delta this reply carries.
    #[must_use]
    pub fn to_delta(&self) -> StateDelta {
        StateDelta::Engine(drivetrain_core::EngineUpdate {
            throttle: self.throttle,
            brake: self.brake,
            steer: self.steer,
            reverse: self.reverse != 0,
            speed: self.speed,
            heading: self.heading,
            x: self.x,
            y: self.y,
            rpm: self.rpm,
            power: self.power,
            torque: self.torque,
        })
    }
}

/// Orchestrator → transmission.
///
/// Total size: 48 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TransmissionRequest {
    /// Always [`Role::Transmission`].
    pub role: i32,
    /// Explicit padding.
    pub _padding0: [u8; 4],
    /// Speed in m/s.
    pub speed: f64,
    /// Current gear.
    pub gear: i32,
    /// Explicit padding.
    pub _padding1: [u8; 4],
    /// Engine speed.
    pub rpm: f64,
    /// Reverse requested (0/1).
    pub reverse: i32,
    /// Explicit padding.
    pub _padding2: [u8; 4],
    /// Throttle position.
    pub throttle: f64,
}

impl TransmissionRequest {
    /// Size in bytes.
    pub const SIZE: usize = 48;

    /// Builds the request from a state snapshot.
    #[must_use]
    pub fn from_state(state: &VehicleState) -> Self {
        Self {
            role: Role::Transmission.tag(),
            _padding0: [0; 4],
            speed: state.speed,
            gear: state.gear,
            _padding1: [0; 4],
            rpm: state.rpm,
            reverse: flag(state.reverse),
            _padding2: [0; 4],
            throttle: state.throttle,
        }
    }

    /// The model input carried by this request.
    #[must_use]
    pub fn to_input(&self) -> TransmissionInput {
        TransmissionInput {
            speed: self.speed,
            gear: self.gear,
            rpm: self.rpm,
            reverse: self.reverse != 0,
            throttle: self.throttle,
        }
    }
}

/// Transmission → orchestrator.
///
/// Total size: 8 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TransmissionReply {
    /// Always [`Role::Transmission`].
    pub role: i32,
    /// Gear to engage.
    pub updated_gear: i32,
}

impl TransmissionReply {
    /// Size in bytes.
    pub const SIZE: usize = 8;

    /// Builds the reply for a chosen gear.
    #[must_use]
    pub const fn new(updated_gear: i32) -> Self {
        Self {
            role: Role::Transmission.tag(),
            updated_gear,
        }
    }

    /// The state delta this reply carries.
    #[must_use]
    pub const fn to_delta(&self) -> StateDelta {
        StateDelta::Gear(self.updated_gear)
    }
}

/// Orchestrator → fuel.
///
/// Total size: 48 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct FuelRequest {
    /// Always [`Role::Fuel`].
    pub role: i32,
    /// Explicit padding.
    pub _padding0: [u8; 4],
    /// Throttle position.
    pub throttle: f64,
    /// Speed in m/s.
    pub speed: f64,
    /// Engine speed, truncated toward zero.
    pub rpm: i32,
    /// Explicit padding.
    pub _padding1: [u8; 4],
    /// Engine power in watts.
    pub power: f64,
    /// Fuel before this tick.
    pub current_fuel: f64,
}

impl FuelRequest {
    /// Size in bytes.
    pub const SIZE: usize = 48;

    /// Builds the request from a state snapshot.
    #[must_use]
    pub fn from_state(state: &VehicleState) -> Self {
        Self {
            role: Role::Fuel.tag(),
            _padding0: [0; 4],
            throttle: state.throttle,
            speed: state.speed,
            rpm: state.rpm as i32,
            _padding1: [0; 4],
            power: state.power,
            current_fuel: state.fuel,
        }
    }

    /// The model input carried by this request.
    #[must_use]
    pub fn to_input(&self) -> FuelInput {
        FuelInput {
            throttle: self.throttle,
            speed: self.speed,
            rpm: self.rpm,
            power: self.power,
            current_fuel: self.current_fuel,
        }
    }
}

/// Fuel → orchestrator.
///
/// Total size: 32 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct FuelReply {
    /// Always [`Role::Fuel`].
    pub role: i32,
    /// Explicit padding.
    pub _padding0: [u8; 4],
    /// Fuel after this tick.
    pub updated_fuel: f64,
    /// Tank empty (0/1).
    pub no_fuel: i32,
    /// Low fuel (0/1).
    pub low_fuel: i32,
    /// Tank full (0/1).
    pub full_fuel: i32,
    /// Explicit padding.
    pub _padding1: [u8; 4],
}

impl FuelReply {
    /// Size in bytes.
    pub const SIZE: usize = 32;

    /// Builds the reply from a model decision.
    #[must_use]
    pub fn from_decision(decision: &FuelDecision) -> Self {
        Self {
            role: Role::Fuel.tag(),
            _padding0: [0; 4],
            updated_fuel: decision.fuel,
            no_fuel: flag(decision.no_fuel),
            low_fuel: flag(decision.low_fuel),
            full_fuel: flag(decision.full_fuel),
            _padding1: [0; 4],
        }
    }

    /// The state delta this reply carries.
    #[must_use]
    pub fn to_delta(&self) -> StateDelta {
        StateDelta::Fuel(self.updated_fuel)
    }
}

const _: () = assert!(std::mem::size_of::<EngineRequest>() == EngineRequest::SIZE);
const _: () = assert!(std::mem::size_of::<EngineReply>() == EngineReply::SIZE);
const _: () = assert!(std::mem::size_of::<TransmissionRequest>() == TransmissionRequest::SIZE);
const _: () = assert!(std::mem::size_of::<TransmissionReply>() == TransmissionReply::SIZE);
const _: () = assert!(std::mem::size_of::<FuelRequest>() == FuelRequest::SIZE);
const _: () = assert!(std::mem::size_of::<FuelReply>() == FuelReply::SIZE);
const _: () = assert!(std::mem::size_of::<i32>() == ROLE_TAG_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<EngineRequest>(), 48);
        assert_eq!(std::mem::size_of::<EngineReply>(), 88);
        assert_eq!(std::mem::size_of::<TransmissionRequest>(), 48);
        assert_eq!(std::mem::size_of::<TransmissionReply>(), 8);
        assert_eq!(std::mem::size_of::<FuelRequest>(), 48);
        assert_eq!(std::mem::size_of::<FuelReply>(), 32);
    }

    #[test]
    fn test_role_tags() {
        for role in Role::ALL {
            assert_eq!(Role::from_tag(role.tag()), Some(role));
            assert_eq!(Role::ALL[role.index()], role);
        }
        assert_eq!(Role::Engine.tag(), 1);
        assert_eq!(Role::Fuel.tag(), 3);
        assert_eq!(Role::from_tag(0), None);
        assert_eq!(Role::from_tag(4), None);
        assert_eq!(Role::Transmission.to_string(), "transmission");
    }

    #[test]
    fn test_read_role_tag_native_order() {
        let bytes = 2i32.to_ne_bytes();
        assert_eq!(read_role_tag(&mut &bytes[..]).unwrap(), 2);

        let short = [1u8, 0];
        assert!(read_role_tag(&mut &short[..]).is_err());
    }

    #[test]
    fn test_field_offsets_follow_declaration_order() {
        let request = TransmissionRequest {
            role: 2,
            gear: 4,
            reverse: 1,
            ..TransmissionRequest::default()
        };
        let bytes = bytemuck::bytes_of(&request);
        assert_eq!(&bytes[0..4], &2i32.to_ne_bytes());
        assert_eq!(&bytes[16..20], &4i32.to_ne_bytes());
        assert_eq!(&bytes[32..36], &1i32.to_ne_bytes());
    }

    #[test]
    fn test_fuel_request_truncates_rpm() {
        let state = VehicleState {
            rpm: 2345.9,
            ..VehicleState::initial()
        };
        assert_eq!(FuelRequest::from_state(&state).rpm, 2345);
    }

    #[test]
    fn test_replies_become_deltas() {
        let reply = EngineReply {
            reverse: 1,
            speed: 3.0,
            ..EngineReply::default()
        };
        match reply.to_delta() {
            StateDelta::Engine(update) => {
                assert!(update.reverse);
                assert_eq!(update.speed, 3.0);
            }
            other => panic!("unexpected delta {other:?}"),
        }
        assert_eq!(TransmissionReply::new(3).to_delta(), StateDelta::Gear(3));

        let fuel = FuelReply::from_decision(&FuelDecision {
            fuel: 12.5,
            low_fuel: false,
            ..FuelDecision::default()
        });
        assert_eq!(fuel.to_delta(), StateDelta::Fuel(12.5));
        assert_eq!(fuel.role, 3);
    }
}
