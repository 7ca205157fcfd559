//! Simulated device for end-to-end tests.
//!
//! Speaks the wire format independently of the crate under test: it checks
//! header and declared length itself and builds its own replies.
//! - `0x11` → 8-byte telemetry (85 %, 14000 mV, 15.5 m, no errors)
//! - `0x10` → 1-byte status `0x01`
//! - anything else → silence

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const HEADER: u8 = 0x55;

/// A datagram to send back, optionally after a delay.
pub type Reply = (Duration, Vec<u8>);

pub struct MockDevice {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockDevice {
    /// Device implementing the standard command set.
    pub async fn spawn() -> Self {
        Self::spawn_with(standard_replies).await
    }

    /// Device that answers each valid request with `handler(opcode)`.
    pub async fn spawn_with<F>(handler: F) -> Self
    where
        F: Fn(u8) -> Vec<Reply> + Send + 'static,
    {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                    continue;
                };
                let data = &buf[..n];

                if n < 4 || data[0] != HEADER || n < data[1] as usize + 3 {
                    continue;
                }

                for (delay, reply) in handler(data[2]) {
                    if delay.is_zero() {
                        let _ = socket.send_to(&reply, from).await;
                    } else {
                        let socket = socket.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = socket.send_to(&reply, from).await;
                        });
                    }
                }
            }
        });

        Self { addr, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Encode a frame the way the device firmware does.
pub fn device_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![HEADER, (1 + payload.len()) as u8, opcode];
    frame.extend_from_slice(payload);
    let chk = frame.iter().fold(0u8, |acc, b| acc ^ b);
    frame.push(chk);
    frame
}

pub fn telemetry_payload() -> Vec<u8> {
    let mut payload = vec![85u8];
    payload.extend_from_slice(&14000u16.to_le_bytes());
    payload.extend_from_slice(&15.5f32.to_le_bytes());
    payload.push(0);
    payload
}

pub fn standard_replies(opcode: u8) -> Vec<Reply> {
    match opcode {
        0x11 => vec![(Duration::ZERO, device_frame(0x11, &telemetry_payload()))],
        0x10 => vec![(Duration::ZERO, device_frame(0x10, &[0x01]))],
        _ => Vec::new(),
    }
}
