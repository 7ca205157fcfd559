//! Opcode sweep.
//!
//! Probes every opcode from `0x00` to `0xFF` in ascending order with an
//! empty-payload frame, classifies the reply and emits exactly one
//! [`ScanResult`] per opcode to a [`ResultSink`](crate::sink::ResultSink).
//!
//! Missing or malformed replies are rows, not errors. The sweep only stops
//! early if the socket cannot be opened or the sink cannot be written.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::client::DeviceClient;
use crate::error::Result;
use crate::protocol::{build_frame, parse_frame};
use crate::sink::ResultSink;

/// Default retries per probe.
pub const DEFAULT_SCAN_RETRIES: u32 = 1;

/// Default delay between probes.
pub const DEFAULT_PACING: Duration = Duration::from_millis(20);

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// No correlated reply after all attempts.
    Timeout,
    /// Well-formed reply.
    Valid,
    /// Reply arrived but failed frame validation.
    InvalidFormat,
}

impl ScanStatus {
    /// Label used in CSV output and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::Valid => "VALID",
            Self::InvalidFormat => "INVALID_FORMAT",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    /// Probed opcode.
    pub opcode: u8,
    pub status: ScanStatus,
    /// Length of the validated frame slice (0 on timeout).
    pub rx_len: usize,
    pub rx_opcode: Option<u8>,
    /// Reply payload as uppercase hex.
    pub rx_payload: String,
    pub trailing_bytes: Option<usize>,
    /// Frame error, empty for valid replies and timeouts.
    pub error_message: String,
    /// Round trip including retries, in milliseconds.
    pub rtt_ms: f64,
}

impl ScanResult {
    /// Classify the reply (or its absence) to a probe of `opcode`.
    pub fn from_reply(opcode: u8, reply: Option<&[u8]>, rtt: Duration) -> Self {
        let rtt_ms = rtt.as_secs_f64() * 1000.0;

        let Some(data) = reply else {
            return Self {
                opcode,
                status: ScanStatus::Timeout,
                rx_len: 0,
                rx_opcode: None,
                rx_payload: String::new(),
                trailing_bytes: None,
                error_message: String::new(),
                rtt_ms,
            };
        };

        let frame = parse_frame(data);
        let (status, error_message) = match &frame.error {
            None => (ScanStatus::Valid, String::new()),
            Some(e) => (ScanStatus::InvalidFormat, e.to_string()),
        };

        Self {
            opcode,
            status,
            rx_len: frame.raw.len(),
            rx_opcode: Some(frame.opcode),
            rx_payload: hex::encode_upper(frame.payload()),
            trailing_bytes: Some(frame.trailing.len()),
            error_message,
            rtt_ms,
        }
    }

    /// Probed opcode as `0xNN`.
    pub fn opcode_hex(&self) -> String {
        format!("0x{:02X}", self.opcode)
    }
}

/// Counts per status after a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub valid: usize,
    pub invalid: usize,
    pub timeouts: usize,
    /// Opcodes that produced a valid reply, ascending.
    pub hits: Vec<u8>,
}

impl ScanSummary {
    fn count(&mut self, result: &ScanResult) {
        match result.status {
            ScanStatus::Valid => {
                self.valid += 1;
                self.hits.push(result.opcode);
            }
            ScanStatus::InvalidFormat => self.invalid += 1,
            ScanStatus::Timeout => self.timeouts += 1,
        }
    }

    /// Number of probes made.
    pub fn total(&self) -> usize {
        self.valid + self.invalid + self.timeouts
    }
}

/// Scan settings.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Retries per probe.
    pub retries: u32,
    /// Delay after every probe.
    pub pacing: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_SCAN_RETRIES,
            pacing: DEFAULT_PACING,
        }
    }
}

/// Sweeps the full opcode space through a [`DeviceClient`].
#[derive(Debug, Clone, Default)]
pub struct OpcodeScanner {
    config: ScanConfig,
}

impl OpcodeScanner {
    /// Create a scanner with the given retry and pacing settings.
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Current scan configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Probe opcodes `0x00..=0xFF` and write one row per opcode to `sink`.
    pub async fn scan<S>(&self, client: &mut DeviceClient, sink: &mut S) -> Result<ScanSummary>
    where
        S: ResultSink + ?Sized,
    {
        client.connect().await?;
        tracing::info!("Starting opcode scan of {}", client.config().target());

        let mut summary = ScanSummary::default();

        for opcode in 0..=u8::MAX {
            let probe = build_frame(opcode, &[]);

            let start = Instant::now();
            let reply = client
                .send_command(&probe, self.config.retries, Some(opcode))
                .await?;
            let result = ScanResult::from_reply(opcode, reply.as_deref(), start.elapsed());

            if result.status == ScanStatus::Valid {
                tracing::info!("Hit: 0x{:02X} -> Payload: {}", opcode, result.rx_payload);
            }

            summary.count(&result);
            sink.record(&result)?;

            if !self.config.pacing.is_zero() {
                tokio::time::sleep(self.config.pacing).await;
            }
        }

        sink.finish()?;
        tracing::info!(
            "Scan complete: {} valid, {} invalid, {} timeouts",
            summary.valid,
            summary.invalid,
            summary.timeouts
        );
        Ok(summary)
    }
}
