//! Codec module - decoding of opcode-specific payloads.
//!
//! Frames carry opaque payloads; the codecs here give known replies their
//! structure:
//!
//! - [`TelemetryCodec`] - fixed 8-byte GET_TELEMETRY layout
//!
//! # Design
//!
//! Codecs are marker structs with static methods. Decode failures are
//! returned as values, never panics, since payloads come straight off an
//! untrusted device.
//!
//! # Example
//!
//! ```
//! use devprobe::codec::TelemetryCodec;
//!
//! let payload = [85, 0xB0, 0x36, 0x00, 0x00, 0x78, 0x41, 0x00];
//! let reading = TelemetryCodec::decode(&payload).unwrap();
//! assert_eq!(reading.battery, 85);
//! assert_eq!(reading.voltage_mv, 14000);
//! assert_eq!(reading.altitude_m, 15.5);
//! ```

mod telemetry;

pub use telemetry::{DecodeError, TelemetryCodec, TelemetryReading, TELEMETRY_PAYLOAD_SIZE};
