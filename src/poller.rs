//! GET_TELEMETRY polling.
//!
//! Repeatedly asks the device for its sensor snapshot and hands each
//! outcome to the caller. Polls do not retry: at 10 Hz a fresh request is
//! worth more than a late one.

use std::time::Duration;

use crate::client::DeviceClient;
use crate::codec::{DecodeError, TelemetryCodec, TelemetryReading};
use crate::error::Result;
use crate::protocol::{build_frame, parse_frame, FrameError, OpCode};

/// Default delay between polls (10 Hz).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of one telemetry request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Well-formed reply with a decoded snapshot.
    Reading(TelemetryReading),
    /// No correlated reply within the timeout.
    NoResponse,
    /// Reply failed frame validation.
    BadFrame(FrameError),
    /// Valid frame whose payload is not a telemetry snapshot.
    Decode(DecodeError),
}

/// Polls GET_TELEMETRY through a [`DeviceClient`].
#[derive(Debug, Clone)]
pub struct TelemetryPoller {
    interval: Duration,
    request: Vec<u8>,
}

impl Default for TelemetryPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl TelemetryPoller {
    /// Create a poller that waits `interval` between requests.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            request: build_frame(OpCode::GetTelemetry.as_byte(), &[]),
        }
    }

    /// Send one request and classify the reply.
    pub async fn poll_once(&self, client: &mut DeviceClient) -> Result<PollOutcome> {
        let opcode = OpCode::GetTelemetry.as_byte();
        let Some(data) = client.send_command(&self.request, 0, Some(opcode)).await? else {
            return Ok(PollOutcome::NoResponse);
        };

        let frame = parse_frame(&data);
        if let Some(e) = &frame.error {
            return Ok(PollOutcome::BadFrame(e.clone()));
        }

        Ok(match TelemetryCodec::decode(frame.payload()) {
            Ok(reading) => PollOutcome::Reading(reading),
            Err(e) => PollOutcome::Decode(e),
        })
    }

    /// Poll `count` times (forever when `None`), calling `on_outcome` after
    /// each request.
    pub async fn run<F>(
        &self,
        client: &mut DeviceClient,
        count: Option<usize>,
        mut on_outcome: F,
    ) -> Result<()>
    where
        F: FnMut(&PollOutcome),
    {
        let mut polled = 0usize;
        while count.map_or(true, |n| polled < n) {
            let outcome = self.poll_once(client).await?;
            match &outcome {
                PollOutcome::BadFrame(e) => tracing::debug!("Telemetry frame rejected: {}", e),
                PollOutcome::Decode(e) => tracing::warn!("Decode error: {}", e),
                _ => {}
            }
            on_outcome(&outcome);
            polled += 1;

            tokio::time::sleep(self.interval).await;
        }
        Ok(())
    }
}
