//! Wire protocol for AVON LED sign controllers.
//!
//! The controllers speak a binary-framed protocol over TCP: a fixed
//! header (ASCII magic, opcode, payload length) followed by a UTF-8 JSON
//! payload whose schema depends on the opcode. This crate is the pure
//! codec half of the client: bytes in, typed frames out, no I/O.

pub mod frame;
pub mod payload;

pub use frame::{Frame, FrameError, HEADER_LEN, MAX_PAYLOAD_LEN, Opcode, decode, encode};
pub use payload::{
    ListRequest, LoginAck, LoginRequest, ProgramId, ProgramInfo, ProgramList, SessionToken,
    SwitchAck, SwitchRequest,
};
