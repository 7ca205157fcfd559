//! Protocol module - wire format, frame building and parsing.
//!
//! This module implements the 0x55-framed datagram protocol:
//! - Opcode constants and checksum
//! - Frame building for outbound commands
//! - Best-effort frame parsing with a validity verdict

mod frame;
mod wire_format;

pub use frame::{parse_frame, Frame, FrameError};
pub use wire_format::{
    build_frame, checksum, try_build_frame, OpCode, FRAME_OVERHEAD, HEADER, MAX_PAYLOAD_SIZE,
    MIN_FRAME_SIZE, OPCODE_OFFSET, PAYLOAD_OFFSET,
};
