//! # devprobe
//!
//! UDP probe client and opcode scanner for embedded devices speaking a
//! 0x55-framed binary protocol.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): frame building, best-effort parsing, XOR checksum
//! - **Codec** ([`codec`]): structured decoding of known reply payloads
//! - **Transport** ([`transport`], [`DeviceClient`]): one UDP socket per device,
//!   send-and-wait with retries, stale reply flushing and opcode correlation
//! - **Scanner** ([`OpcodeScanner`], [`sink`]): sweep of all 256 opcodes,
//!   one result row per opcode
//!
//! ## Example
//!
//! ```ignore
//! use devprobe::sink::CsvSink;
//! use devprobe::{DeviceClient, OpcodeScanner};
//!
//! #[tokio::main]
//! async fn main() -> devprobe::Result<()> {
//!     let mut client = DeviceClient::builder()
//!         .host("192.168.10.1")
//!         .port(8889)
//!         .build();
//!
//!     let mut sink = CsvSink::create("drone_scan.csv")?;
//!     let summary = OpcodeScanner::default().scan(&mut client, &mut sink).await;
//!     client.close();
//!
//!     println!("hits: {:02X?}", summary?.hits);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod scanner;
pub mod sink;
pub mod transport;

mod client;

pub use client::{ClientBuilder, ClientConfig, DeviceClient, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{ProbeError, Result};
pub use poller::{PollOutcome, TelemetryPoller};
pub use scanner::{OpcodeScanner, ScanConfig, ScanResult, ScanStatus, ScanSummary};
