//! # Session Protocol
//!
//! A session starts with one 4-byte role tag from the subsystem. After that
//! the orchestrator sends one request record per tick and blocks for the
//! matching reply record. No acknowledgement, no framing.

mod messages;

pub use messages::{
    read_role_tag, EngineReply, EngineRequest, FuelReply, FuelRequest, Role, TransmissionReply,
    TransmissionRequest, ROLE_TAG_SIZE,
};
