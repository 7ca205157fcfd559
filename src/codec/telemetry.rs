//! GET_TELEMETRY payload codec.
//!
//! Fixed 8-byte layout, Little Endian:
//! ```text
//! ┌─────────┬─────────┬──────────┬───────┐
//! │ Battery │ Voltage │ Altitude │ Flags │
//! │ u8 (%)  │ u16 mV  │ f32 m    │ u8    │
//! └─────────┴─────────┴──────────┴───────┘
//! ```
//!
//! # Example
//!
//! ```
//! use devprobe::codec::{TelemetryCodec, TelemetryReading};
//!
//! let reading = TelemetryReading::new(85, 14000, 15.5, 0);
//! let payload = TelemetryCodec::encode(&reading);
//! assert_eq!(TelemetryCodec::decode(&payload).unwrap(), reading);
//! assert!(TelemetryCodec::decode(&payload[..7]).is_err());
//! ```

use serde::Serialize;
use thiserror::Error;

/// Telemetry payload size in bytes (1 + 2 + 4 + 1).
pub const TELEMETRY_PAYLOAD_SIZE: usize = 8;

/// Payload did not match the fixed telemetry layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("size_mismatch: expected {expected} bytes, got {actual} (raw {raw})")]
    SizeMismatch {
        expected: usize,
        actual: usize,
        /// Offending payload as lowercase hex.
        raw: String,
    },
}

/// Decoded sensor snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryReading {
    /// Battery charge in percent.
    pub battery: u8,
    /// Supply voltage in millivolts.
    pub voltage_mv: u16,
    /// Altitude in meters, rounded to 2 decimals.
    pub altitude_m: f32,
    /// Device error bitmask.
    #[serde(serialize_with = "serialize_flags")]
    pub error_flags: u8,
}

impl TelemetryReading {
    /// Create a reading; altitude is rounded to 2 decimals.
    pub fn new(battery: u8, voltage_mv: u16, altitude_m: f32, error_flags: u8) -> Self {
        Self {
            battery,
            voltage_mv,
            altitude_m: round_centi(altitude_m),
            error_flags,
        }
    }

    /// Error flags as `0x..` hex.
    pub fn error_flags_hex(&self) -> String {
        format!("{:#x}", self.error_flags)
    }
}

fn serialize_flags<S: serde::Serializer>(flags: &u8, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{:#x}", flags))
}

/// Round to 2 decimals, ties to even. `value * 100` is exact in f64.
fn round_centi(value: f32) -> f32 {
    ((value as f64 * 100.0).round_ties_even() / 100.0) as f32
}

/// Codec for the GET_TELEMETRY reply payload.
pub struct TelemetryCodec;

impl TelemetryCodec {
    /// Decode an 8-byte payload. Any other length is a [`DecodeError`].
    pub fn decode(payload: &[u8]) -> Result<TelemetryReading, DecodeError> {
        let bytes: &[u8; TELEMETRY_PAYLOAD_SIZE] =
            payload
                .try_into()
                .map_err(|_| DecodeError::SizeMismatch {
                    expected: TELEMETRY_PAYLOAD_SIZE,
                    actual: payload.len(),
                    raw: hex::encode(payload),
                })?;

        Ok(TelemetryReading::new(
            bytes[0],
            u16::from_le_bytes([bytes[1], bytes[2]]),
            f32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
            bytes[7],
        ))
    }

    /// Encode a reading into its 8-byte payload.
    pub fn encode(reading: &TelemetryReading) -> [u8; TELEMETRY_PAYLOAD_SIZE] {
        let mut buf = [0u8; TELEMETRY_PAYLOAD_SIZE];
        buf[0] = reading.battery;
        buf[1..3].copy_from_slice(&reading.voltage_mv.to_le_bytes());
        buf[3..7].copy_from_slice(&reading.altitude_m.to_le_bytes());
        buf[7] = reading.error_flags;
        buf
    }
}
