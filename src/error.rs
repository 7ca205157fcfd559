//! Error types for devprobe.
//!
//! Only failures that end a run live here. Framing problems, telemetry
//! decode problems and unanswered commands are ordinary data (see
//! [`FrameError`](crate::protocol::FrameError),
//! [`DecodeError`](crate::codec::DecodeError) and the `Option` returned by
//! [`DeviceClient::send_command`](crate::DeviceClient::send_command)).

use thiserror::Error;

/// Main error type for all devprobe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// I/O error during socket setup or sink writes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV sink error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error (JSON Lines sink).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Target host did not resolve to any socket address.
    #[error("Could not resolve target {0}")]
    Resolve(String),

    /// Protocol error (frame cannot be encoded, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using ProbeError.
pub type Result<T> = std::result::Result<T, ProbeError>;
