//! devprobe command line.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use devprobe::protocol::{try_build_frame, OpCode};
use devprobe::sink::{CsvSink, JsonLinesSink, ResultSink};
use devprobe::{
    DeviceClient, OpcodeScanner, PollOutcome, ScanConfig, TelemetryPoller, DEFAULT_HOST,
    DEFAULT_PORT,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "devprobe")]
#[command(about = "Probe and opcode-scan a UDP device", long_about = None)]
struct Cli {
    /// Device host
    #[arg(long, env = "TARGET_IP", default_value = DEFAULT_HOST)]
    host: String,

    /// Device UDP port
    #[arg(long, env = "TARGET_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Per-attempt timeout in milliseconds
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep opcodes 0x00..=0xFF and record every reply
    Scan {
        #[arg(short, long, default_value = "drone_scan.csv")]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,
        #[arg(long, default_value = "1")]
        retries: u32,
        #[arg(long, default_value = "20")]
        pacing_ms: u64,
    },
    /// Poll GET_TELEMETRY and print readings as JSON lines
    Telemetry {
        /// Stop after this many polls
        #[arg(short, long)]
        count: Option<usize>,
        #[arg(long, default_value = "100")]
        interval_ms: u64,
    },
    /// Send a single command and print the parsed reply
    Send {
        /// Opcode, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_byte)]
        opcode: u8,
        /// Payload as hex
        #[arg(short, long, default_value = "")]
        payload: String,
        #[arg(long, default_value = "2")]
        retries: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Jsonl,
}

fn parse_byte(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid opcode {:?}: {}", s, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    tracing::info!("Target: {}:{}", cli.host, cli.port);

    let mut client = DeviceClient::builder()
        .host(cli.host.clone())
        .port(cli.port)
        .timeout(Duration::from_millis(cli.timeout_ms))
        .build();

    let result = tokio::select! {
        r = run(cli.command, &mut client) => r,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    tracing::info!("Closing client...");
    client.close();
    result
}

async fn run(command: Command, client: &mut DeviceClient) -> Result<()> {
    match command {
        Command::Scan {
            output,
            format,
            retries,
            pacing_ms,
        } => {
            let mut sink: Box<dyn ResultSink> = match format {
                Format::Csv => Box::new(CsvSink::create(&output)?),
                Format::Jsonl => Box::new(JsonLinesSink::create(&output)?),
            };
            let scanner = OpcodeScanner::new(ScanConfig {
                retries,
                pacing: Duration::from_millis(pacing_ms),
            });

            let summary = scanner
                .scan(client, sink.as_mut())
                .await
                .context("opcode scan aborted")?;
            tracing::info!(
                "Results saved to {} ({} hits: {:02X?})",
                output.display(),
                summary.valid,
                summary.hits
            );
        }

        Command::Telemetry { count, interval_ms } => {
            let poller = TelemetryPoller::new(Duration::from_millis(interval_ms));
            poller
                .run(client, count, |outcome| {
                    if let PollOutcome::Reading(reading) = outcome {
                        match serde_json::to_string(reading) {
                            Ok(line) => println!("{}", line),
                            Err(e) => tracing::error!("Serialize error: {}", e),
                        }
                    }
                })
                .await
                .context("telemetry polling aborted")?;
        }

        Command::Send {
            opcode,
            payload,
            retries,
        } => {
            let payload = hex::decode(&payload).context("payload is not valid hex")?;
            let packet = try_build_frame(opcode, &payload)?;
            let name = OpCode::from_byte(opcode).map_or("-", OpCode::name);
            tracing::info!("Tx 0x{:02X} ({}): {}", opcode, name, hex::encode_upper(&packet));

            match client.request(opcode, &payload, retries).await? {
                None => println!("no response"),
                Some(frame) => {
                    println!("status:   {}", frame.error_message());
                    println!("opcode:   0x{:02X}", frame.opcode);
                    println!("payload:  {}", hex::encode_upper(frame.payload()));
                    println!("trailing: {}", hex::encode_upper(frame.trailing()));
                }
            }
        }
    }

    Ok(())
}
