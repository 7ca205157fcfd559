//! Wire format constants, opcodes and frame encoding.
//!
//! Every frame is a single UDP datagram:
//! ```text
//! ┌────────┬────────┬────────┬──────────────────┬──────────┐
//! │ Header │ Length │ Opcode │ Payload          │ Checksum │
//! │ 0x55   │ 1 byte │ 1 byte │ Length - 1 bytes │ 1 byte   │
//! └────────┴────────┴────────┴──────────────────┴──────────┘
//! ```
//!
//! `Length` counts the opcode plus the payload. The checksum is the XOR of
//! every byte before it. Multi-byte payload fields are Little Endian.

use crate::error::{ProbeError, Result};

/// Frame start marker.
pub const HEADER: u8 = 0x55;

/// Smallest frame that can carry header, length, opcode and checksum.
pub const MIN_FRAME_SIZE: usize = 4;

/// Bytes surrounding the declared body: header, length byte, checksum.
pub const FRAME_OVERHEAD: usize = 3;

/// Offset of the opcode byte in every frame.
pub const OPCODE_OFFSET: usize = 2;

/// Offset of the first payload byte.
pub const PAYLOAD_OFFSET: usize = 3;

/// Largest payload the length byte can describe (`255 - 1` for the opcode).
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize - 1;

/// Known device commands.
///
/// Scanning and raw requests take plain `u8` opcodes so that values outside
/// this set can still be sent; use [`OpCode::from_byte`] to name a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Reserved "no-op" sentinel. Not a scanning wildcard.
    Unknown = 0x00,
    /// Device status, 1-byte payload in the reply.
    GetStatus = 0x10,
    /// Sensor snapshot, 8-byte payload in the reply.
    GetTelemetry = 0x11,
    /// LED control.
    SetLed = 0x20,
}

impl OpCode {
    /// Map a raw byte to a known opcode.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Unknown),
            0x10 => Some(Self::GetStatus),
            0x11 => Some(Self::GetTelemetry),
            0x20 => Some(Self::SetLed),
            _ => None,
        }
    }

    /// Raw byte value.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Upper snake case command name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::GetStatus => "GET_STATUS",
            Self::GetTelemetry => "GET_TELEMETRY",
            Self::SetLed => "SET_LED",
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op.as_byte()
    }
}

/// XOR of all bytes in `data`.
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Build a complete frame for `opcode` carrying `payload`.
///
/// Any opcode byte is accepted.
///
/// # Panics
///
/// Debug builds panic if `payload` is longer than [`MAX_PAYLOAD_SIZE`]; use
/// [`try_build_frame`] for payloads of unknown size.
///
/// # Example
///
/// ```
/// use devprobe::protocol::build_frame;
///
/// let bytes = build_frame(0x11, &[]);
/// assert_eq!(bytes, vec![0x55, 0x01, 0x11, 0x55 ^ 0x01 ^ 0x11]);
/// ```
pub fn build_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE);
    let mut buf = Vec::with_capacity(FRAME_OVERHEAD + 1 + payload.len());
    buf.push(HEADER);
    buf.push((1 + payload.len()) as u8);
    buf.push(opcode);
    buf.extend_from_slice(payload);
    buf.push(checksum(&buf));
    buf
}

/// Build a frame, rejecting payloads the length byte cannot describe.
pub fn try_build_frame(opcode: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProbeError::Protocol(format!(
            "Payload size {} exceeds maximum {}",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }
    Ok(build_frame(opcode, payload))
}
