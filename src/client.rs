//! Client builder and request/response loop.
//!
//! The [`ClientBuilder`] configures the target and timing. The
//! [`DeviceClient`] manages the lifecycle:
//! 1. Resolve target and open the UDP link (lazily, on first use)
//! 2. Per attempt: flush stale datagrams, send, wait for a correlated reply
//! 3. Retry on timeout, give up with `None` after the last attempt
//!
//! # Example
//!
//! ```ignore
//! use devprobe::protocol::{build_frame, OpCode};
//! use devprobe::DeviceClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> devprobe::Result<()> {
//!     let mut client = DeviceClient::builder()
//!         .host("192.168.10.1")
//!         .port(8889)
//!         .timeout(Duration::from_millis(500))
//!         .build();
//!
//!     let probe = build_frame(OpCode::GetStatus.as_byte(), &[]);
//!     if let Some(reply) = client.send_command(&probe, 2, Some(0x10)).await? {
//!         println!("{:02X?}", reply);
//!     }
//!     client.close();
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::error::{ProbeError, Result};
use crate::protocol::{parse_frame, try_build_frame, Frame, OPCODE_OFFSET};
use crate::transport::{UdpLink, DEFAULT_QUEUE_CAPACITY};

/// Default target host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default target port.
pub const DEFAULT_PORT: u16 = 8889;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device host name or IP address.
    pub host: String,
    /// Device UDP port.
    pub port: u16,
    /// Time budget for each attempt of a command.
    pub timeout: Duration,
    /// Inbound queue capacity in datagrams.
    pub queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// `host:port` as a display string.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for configuring and creating a [`DeviceClient`].
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the device host.
    ///
    /// Default: 127.0.0.1
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the device port.
    ///
    /// Default: 8889
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set host and port from a socket address.
    pub fn peer(self, addr: SocketAddr) -> Self {
        self.host(addr.ip().to_string()).port(addr.port())
    }

    /// Set the per-attempt timeout.
    ///
    /// Default: 2 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the inbound queue capacity.
    ///
    /// Default: 256
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Build the client. No socket is opened until first use.
    pub fn build(self) -> DeviceClient {
        DeviceClient::new(self.config)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// UDP client for one device.
///
/// One command is in flight at a time: every exchange takes `&mut self`.
/// Run separate clients for concurrent workloads against the same device.
pub struct DeviceClient {
    config: ClientConfig,
    link: Option<UdpLink>,
}

impl DeviceClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client from a configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self { config, link: None }
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Local socket address, once connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().and_then(|link| link.local_addr().ok())
    }

    /// Open the socket. Does nothing if already connected.
    ///
    /// This is the only fallible step of an exchange: failing to resolve,
    /// bind or connect is returned as an error.
    pub async fn connect(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }

        let peer = resolve(&self.config).await?;
        let link = UdpLink::open(peer, self.config.queue_capacity).await?;
        tracing::info!("Connected to {}", peer);
        self.link = Some(link);
        Ok(())
    }

    /// Send `packet` and wait for a reply.
    ///
    /// Makes `retries + 1` attempts, each with the configured timeout. When
    /// `expected_opcode` is set, replies whose opcode byte differs are
    /// discarded without extending the attempt's deadline. Replies under 3
    /// bytes carry no opcode and are returned as-is.
    ///
    /// Returns `Ok(None)` when every attempt timed out.
    pub async fn send_command(
        &mut self,
        packet: &[u8],
        retries: u32,
        expected_opcode: Option<u8>,
    ) -> Result<Option<Bytes>> {
        self.connect().await?;

        let timeout = self.config.timeout;
        let Some(link) = self.link.as_mut() else {
            return Ok(None);
        };

        for attempt in 0..=retries {
            let stale = link.flush();
            if stale > 0 {
                tracing::debug!("Flushed {} stale datagram(s)", stale);
            }

            if let Err(e) = link.send(packet).await {
                tracing::warn!("Send failed: {}", e);
            }

            let deadline = Instant::now() + timeout;
            while Instant::now() < deadline {
                let data = match tokio::time::timeout_at(deadline, link.recv()).await {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::warn!("Receive task stopped");
                        return Ok(None);
                    }
                    Err(_) => break,
                };

                if correlates(&data, expected_opcode) {
                    return Ok(Some(data));
                }

                tracing::debug!(
                    "Dropped mismatched opcode 0x{:02X} (expected 0x{:02X})",
                    data[OPCODE_OFFSET],
                    expected_opcode.unwrap_or_default()
                );
            }

            if attempt < retries {
                tracing::debug!("Timeout (attempt {}/{}), retrying", attempt + 1, retries + 1);
            }
        }

        tracing::warn!("Command failed after {} attempts", retries + 1);
        Ok(None)
    }

    /// Send `opcode` with `payload`, wait for the reply with the same opcode
    /// and parse it.
    pub async fn request(
        &mut self,
        opcode: u8,
        payload: &[u8],
        retries: u32,
    ) -> Result<Option<Frame>> {
        let packet = try_build_frame(opcode, payload)?;
        let reply = self.send_command(&packet, retries, Some(opcode)).await?;
        Ok(reply.map(|data| parse_frame(&data)))
    }

    /// Close the socket and drop anything still queued.
    ///
    /// Safe to call repeatedly, or on a client that never connected.
    pub fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.flush();
            tracing::debug!("Closed link to {}", link.peer());
        }
    }
}

/// Whether `data` answers a command sent with `expected_opcode`.
fn correlates(data: &[u8], expected_opcode: Option<u8>) -> bool {
    match expected_opcode {
        None => true,
        Some(_) if data.len() <= OPCODE_OFFSET => true,
        Some(op) => data[OPCODE_OFFSET] == op,
    }
}

async fn resolve(config: &ClientConfig) -> Result<SocketAddr> {
    tokio::net::lookup_host((config.host.as_str(), config.port))
        .await?
        .next()
        .ok_or_else(|| ProbeError::Resolve(config.target()))
}
