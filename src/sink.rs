//! Scan result sinks.
//!
//! Rows are written and flushed one at a time, in opcode order, so an
//! interrupted sweep still leaves a usable file behind.
//!
//! - [`CsvSink`] - spreadsheet-friendly table with a header row
//! - [`JsonLinesSink`] - one JSON object per line
//! - `Vec<ScanResult>` - in-memory collection
//!
//! # Example
//!
//! ```ignore
//! use devprobe::sink::CsvSink;
//! use devprobe::{DeviceClient, OpcodeScanner};
//!
//! let mut client = DeviceClient::builder().build();
//! let mut sink = CsvSink::create("drone_scan.csv")?;
//! OpcodeScanner::default().scan(&mut client, &mut sink).await?;
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::scanner::ScanResult;

/// CSV column names, in order.
pub const CSV_COLUMNS: [&str; 8] = [
    "Opcode_Hex",
    "Status",
    "Rx_Len",
    "Rx_Opcode",
    "Rx_Payload_Hex",
    "Trailing_Bytes",
    "Error_Msg",
    "RTT_ms",
];

/// Destination for scan rows.
pub trait ResultSink {
    /// Append one row.
    fn record(&mut self, result: &ScanResult) -> Result<()>;

    /// Called once after the last row.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ResultSink for Vec<ScanResult> {
    fn record(&mut self, result: &ScanResult) -> Result<()> {
        self.push(result.clone());
        Ok(())
    }
}

/// Writes rows as CSV.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wrap a writer and write the header row.
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(CSV_COLUMNS)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.error().to_string()).into())
    }
}

/// The eight CSV fields of a row.
pub fn csv_fields(result: &ScanResult) -> [String; 8] {
    [
        result.opcode_hex(),
        result.status.to_string(),
        result.rx_len.to_string(),
        result
            .rx_opcode
            .map(|op| format!("0x{:02X}", op))
            .unwrap_or_default(),
        result.rx_payload.clone(),
        result
            .trailing_bytes
            .map(|n| n.to_string())
            .unwrap_or_default(),
        result.error_message.clone(),
        format!("{:.2}", result.rtt_ms),
    ]
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn record(&mut self, result: &ScanResult) -> Result<()> {
        self.writer.write_record(csv_fields(result))?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes rows as newline-delimited JSON.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (or truncate) `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer. Nothing is written until the first row.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn record(&mut self, result: &ScanResult) -> Result<()> {
        serde_json::to_writer(&mut self.writer, result)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
