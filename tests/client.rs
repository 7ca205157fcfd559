//! End-to-end tests for DeviceClient against a simulated device.

mod common;

use std::time::{Duration, Instant};

use common::{device_frame, telemetry_payload, MockDevice};
use devprobe::codec::{DecodeError, TelemetryCodec, TelemetryReading};
use devprobe::protocol::{build_frame, parse_frame, FrameError, OpCode};
use devprobe::{DeviceClient, PollOutcome, TelemetryPoller};
use tokio::net::UdpSocket;

fn client_for(device: &MockDevice, timeout: Duration) -> DeviceClient {
    DeviceClient::builder()
        .peer(device.addr())
        .timeout(timeout)
        .build()
}

#[tokio::test]
async fn test_telemetry_exchange() {
    let device = MockDevice::spawn().await;
    let mut client = client_for(&device, Duration::from_millis(500));

    let probe = build_frame(OpCode::GetTelemetry.as_byte(), &[]);
    let reply = client
        .send_command(&probe, 2, Some(0x11))
        .await
        .unwrap()
        .expect("device answers GET_TELEMETRY");

    let frame = parse_frame(&reply);
    assert!(frame.is_valid());
    assert_eq!(frame.opcode, 0x11);

    let reading = TelemetryCodec::decode(frame.payload()).unwrap();
    assert_eq!(reading.battery, 85);
    assert_eq!(reading.voltage_mv, 14000);
    assert_eq!(reading.altitude_m, 15.5);
    assert_eq!(reading.error_flags_hex(), "0x0");

    client.close();
}

#[tokio::test]
async fn test_request_parses_status() {
    let device = MockDevice::spawn().await;
    let mut client = client_for(&device, Duration::from_millis(500));

    let frame = client.request(0x10, &[], 1).await.unwrap().unwrap();
    assert!(frame.is_valid());
    assert_eq!(frame.payload(), &[0x01]);
}

#[tokio::test]
async fn test_unknown_opcode_times_out() {
    let device = MockDevice::spawn().await;
    let mut client = client_for(&device, Duration::from_millis(50));

    let reply = client
        .send_command(&build_frame(0xAB, &[]), 0, Some(0xAB))
        .await
        .unwrap();
    assert!(reply.is_none());
    // Still usable afterwards
    assert!(client.request(0x10, &[], 0).await.unwrap().is_some());
}

#[tokio::test]
async fn test_correlation_discards_mismatched_reply() {
    // Answer GET_TELEMETRY with a stray status reply first, then the real one.
    // Answer GET_STATUS with a status payload distinct from the stray one.
    let device = MockDevice::spawn_with(|opcode| match opcode {
        0x11 => vec![
            (Duration::ZERO, device_frame(0x10, &[0xEE])),
            (Duration::ZERO, device_frame(0x11, &telemetry_payload())),
        ],
        0x10 => vec![(Duration::from_millis(20), device_frame(0x10, &[0x02]))],
        _ => Vec::new(),
    })
    .await;
    let mut client = client_for(&device, Duration::from_millis(500));

    let reply = client
        .send_command(&build_frame(0x11, &[]), 0, Some(0x11))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply[2], 0x11);

    let reply = client
        .send_command(&build_frame(0x10, &[]), 0, Some(0x10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(parse_frame(&reply).payload(), &[0x02]);
}

#[tokio::test]
async fn test_mismatches_do_not_extend_deadline() {
    // A flood of wrong-opcode replies spread across the whole attempt
    let device = MockDevice::spawn_with(|_| {
        (0..20)
            .map(|i| (Duration::from_millis(10 * i), device_frame(0x99, &[])))
            .collect()
    })
    .await;
    let timeout = Duration::from_millis(100);
    let mut client = client_for(&device, timeout);

    let start = Instant::now();
    let reply = client
        .send_command(&build_frame(0x11, &[]), 0, Some(0x11))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(reply.is_none());
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_millis(100), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_stale_reply_is_flushed_before_next_command() {
    // The reply to 0x30 arrives well after the client gave up on it
    let device = MockDevice::spawn_with(|opcode| match opcode {
        0x30 => vec![(Duration::from_millis(100), device_frame(0x30, &[0xDE, 0xAD]))],
        0x10 => vec![(Duration::ZERO, device_frame(0x10, &[0x01]))],
        _ => Vec::new(),
    })
    .await;
    let mut client = client_for(&device, Duration::from_millis(30));

    let reply = client
        .send_command(&build_frame(0x30, &[]), 0, Some(0x30))
        .await
        .unwrap();
    assert!(reply.is_none());

    // Let the late reply land in the queue
    tokio::time::sleep(Duration::from_millis(200)).await;

    let reply = client
        .send_command(&build_frame(0x10, &[]), 0, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply[2], 0x10);
}

#[tokio::test]
async fn test_uncorrelated_command_returns_first_datagram() {
    let device = MockDevice::spawn_with(|_| vec![(Duration::ZERO, device_frame(0x77, &[1]))]).await;
    let mut client = client_for(&device, Duration::from_millis(200));

    let reply = client
        .send_command(&build_frame(0x11, &[]), 0, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply[2], 0x77);
}

#[tokio::test]
async fn test_short_reply_returned_without_correlation_check() {
    let device = MockDevice::spawn_with(|_| vec![(Duration::ZERO, vec![0x55, 0x00])]).await;
    let mut client = client_for(&device, Duration::from_millis(200));

    let reply = client
        .send_command(&build_frame(0x11, &[]), 0, Some(0x11))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&reply[..], &[0x55, 0x00]);
}

#[tokio::test]
async fn test_foreign_sender_is_ignored() {
    let device = MockDevice::spawn_with(|_| Vec::new()).await;
    let mut client = client_for(&device, Duration::from_millis(100));
    client.connect().await.unwrap();
    let local = client.local_addr().unwrap();
    let target = std::net::SocketAddr::from(([127, 0, 0, 1], local.port()));

    let intruder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let spoof = device_frame(0x11, &telemetry_payload());
    let sender = tokio::spawn(async move {
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = intruder.send_to(&spoof, target).await;
        }
    });

    let reply = client
        .send_command(&build_frame(0x11, &[]), 0, Some(0x11))
        .await
        .unwrap();
    assert!(reply.is_none());
    sender.await.unwrap();
}

#[tokio::test]
async fn test_timeout_budget_with_one_retry() {
    let device = MockDevice::spawn_with(|_| Vec::new()).await;
    let timeout = Duration::from_millis(100);
    let mut client = client_for(&device, timeout);
    client.connect().await.unwrap();

    let start = Instant::now();
    let reply = client
        .send_command(&build_frame(0x42, &[]), 1, Some(0x42))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(reply.is_none());
    assert!(elapsed >= timeout * 2, "took {:?}", elapsed);
    assert!(elapsed < timeout * 2 + Duration::from_millis(150), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_retry_recovers_from_lost_first_attempt() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    // Drop the first request, answer the second
    let device = MockDevice::spawn_with(move |opcode| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Vec::new()
        } else {
            vec![(Duration::ZERO, device_frame(opcode, &[0x01]))]
        }
    })
    .await;
    let mut client = client_for(&device, Duration::from_millis(50));

    let reply = client
        .send_command(&build_frame(0x10, &[]), 1, Some(0x10))
        .await
        .unwrap();
    assert!(reply.is_some());
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_close_is_idempotent_and_reconnects() {
    let device = MockDevice::spawn().await;
    let mut client = client_for(&device, Duration::from_millis(200));

    assert!(client.request(0x10, &[], 0).await.unwrap().is_some());
    client.close();
    client.close();
    assert!(!client.is_connected());

    // Implicit reconnect on next command
    assert!(client.request(0x10, &[], 0).await.unwrap().is_some());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_poll_once_decodes_reading() {
    let device = MockDevice::spawn().await;
    let mut client = client_for(&device, Duration::from_millis(500));

    let outcome = TelemetryPoller::default().poll_once(&mut client).await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Reading(TelemetryReading::new(85, 14000, 15.5, 0))
    );
}

#[tokio::test]
async fn test_poll_once_silent_device_single_attempt() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let device = MockDevice::spawn_with(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    })
    .await;
    let mut client = client_for(&device, Duration::from_millis(50));

    let outcome = TelemetryPoller::default().poll_once(&mut client).await.unwrap();
    assert_eq!(outcome, PollOutcome::NoResponse);

    // Polls never retry
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_poll_once_corrupted_reply_is_bad_frame() {
    let device = MockDevice::spawn_with(|opcode| {
        let mut frame = device_frame(opcode, &telemetry_payload());
        *frame.last_mut().unwrap() ^= 0xFF;
        vec![(Duration::ZERO, frame)]
    })
    .await;
    let mut client = client_for(&device, Duration::from_millis(500));

    let outcome = TelemetryPoller::default().poll_once(&mut client).await.unwrap();
    assert!(
        matches!(outcome, PollOutcome::BadFrame(FrameError::BadChecksum { .. })),
        "got {:?}",
        outcome
    );
}

#[tokio::test]
async fn test_poll_once_short_payload_is_decode_error() {
    let device =
        MockDevice::spawn_with(|opcode| vec![(Duration::ZERO, device_frame(opcode, &[0x01]))]).await;
    let mut client = client_for(&device, Duration::from_millis(500));

    let outcome = TelemetryPoller::default().poll_once(&mut client).await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Decode(DecodeError::SizeMismatch {
            expected: 8,
            actual: 1,
            raw: "01".to_string(),
        })
    );
}

#[tokio::test]
async fn test_poller_run_stops_after_count() {
    let device = MockDevice::spawn().await;
    let mut client = client_for(&device, Duration::from_millis(500));
    let poller = TelemetryPoller::new(Duration::from_millis(5));

    let mut outcomes = Vec::new();
    poller
        .run(&mut client, Some(3), |outcome| outcomes.push(outcome.clone()))
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, PollOutcome::Reading(r) if r.battery == 85)));
}
