//! Frame parsing with best-effort field extraction.
//!
//! [`parse_frame`] never fails. It always returns a [`Frame`] and records
//! what was wrong with the bytes in [`Frame::error`]. Once a datagram is long
//! enough to hold its declared length, opcode, payload and trailing bytes are
//! extracted before header and checksum are checked, so a scan still learns
//! something from corrupted or foreign replies.
//!
//! # Example
//!
//! ```
//! use devprobe::protocol::{build_frame, parse_frame};
//!
//! let frame = parse_frame(&build_frame(0x11, &[1, 2, 3]));
//! assert!(frame.is_valid());
//! assert_eq!(frame.opcode, 0x11);
//! assert_eq!(frame.payload(), &[1, 2, 3]);
//! ```

use bytes::Bytes;
use thiserror::Error;

use super::wire_format::{
    checksum, FRAME_OVERHEAD, HEADER, MIN_FRAME_SIZE, OPCODE_OFFSET, PAYLOAD_OFFSET,
};

/// Why a frame failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Empty data")]
    Empty,

    #[error("Frame too short ({len})")]
    TooShort { len: usize },

    #[error("Truncated: Exp {expected} Got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Bad Header 0x{0:02X}")]
    BadHeader(u8),

    /// Declared length 0 leaves no room for the opcode byte.
    #[error("Zero length body")]
    ZeroLength,

    #[error("Bad Checksum: Rx {received:02X} != Calc {computed:02X}")]
    BadChecksum { received: u8, computed: u8 },
}

/// A parsed (possibly invalid) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Byte 0 as received.
    pub header: u8,
    /// Declared body length (opcode + payload).
    pub length: u8,
    /// Command identifier.
    pub opcode: u8,
    /// Opcode-specific body.
    pub payload: Bytes,
    /// Checksum byte as received.
    pub checksum: u8,
    /// The frame-sized slice that was validated, or the whole input when it
    /// was too short to slice.
    pub raw: Bytes,
    /// Bytes beyond the declared frame length.
    pub trailing: Bytes,
    /// `None` when the frame is valid.
    pub error: Option<FrameError>,
}

impl Frame {
    fn rejected(header: u8, length: u8, raw: Bytes, error: FrameError) -> Self {
        Self {
            header,
            length,
            opcode: 0,
            payload: Bytes::new(),
            checksum: 0,
            raw,
            trailing: Bytes::new(),
            error: Some(error),
        }
    }

    /// True when header, length and checksum all check out.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Human-readable verdict, `"OK"` for valid frames.
    pub fn error_message(&self) -> String {
        match &self.error {
            None => "OK".to_string(),
            Some(e) => e.to_string(),
        }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }
}

/// Parse raw datagram bytes into a [`Frame`].
pub fn parse_frame(data: &[u8]) -> Frame {
    if data.is_empty() {
        return Frame::rejected(0, 0, Bytes::new(), FrameError::Empty);
    }

    if data.len() < MIN_FRAME_SIZE {
        return Frame::rejected(
            0,
            0,
            Bytes::copy_from_slice(data),
            FrameError::TooShort { len: data.len() },
        );
    }

    let header = data[0];
    let length = data[1];
    let expected_total = FRAME_OVERHEAD + length as usize;

    if data.len() < expected_total {
        return Frame::rejected(
            header,
            length,
            Bytes::copy_from_slice(data),
            FrameError::Truncated {
                expected: expected_total,
                got: data.len(),
            },
        );
    }

    let raw = Bytes::copy_from_slice(data);
    let trailing = raw.slice(expected_total..);
    let frame_data = raw.slice(..expected_total);

    let opcode = frame_data[OPCODE_OFFSET];
    let received = frame_data[expected_total - 1];
    let payload_len = (length as usize).saturating_sub(1);
    let payload = frame_data.slice(PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload_len);

    let error = if header != HEADER {
        Some(FrameError::BadHeader(header))
    } else if length == 0 {
        Some(FrameError::ZeroLength)
    } else {
        let computed = checksum(&frame_data[..expected_total - 1]);
        (computed != received).then_some(FrameError::BadChecksum { received, computed })
    };

    Frame {
        header,
        length,
        opcode,
        payload,
        checksum: received,
        raw: frame_data,
        trailing,
        error,
    }
}
