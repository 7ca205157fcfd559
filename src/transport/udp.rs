//! UDP link to a single device.
//!
//! A [`UdpLink`] owns one socket connected to the peer and a receive task
//! that feeds an inbound queue:
//!
//! ```text
//! socket ─► receive task ─► filter ─► mpsc::Sender<Bytes> ─► UdpLink::recv
//! ```
//!
//! The filter only drops traffic that is not from the peer and zero-length
//! keepalives. It never looks at content.
//!
//! # Example
//!
//! ```ignore
//! use devprobe::transport::UdpLink;
//!
//! let mut link = UdpLink::open("127.0.0.1:8889".parse()?, 64).await?;
//! link.send(&[0x55, 0x01, 0x11, 0x45]).await?;
//! let reply = link.recv().await;
//! ```

use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::error::Result;

/// Default inbound queue capacity (datagrams).
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Largest datagram the receive task reads in one go.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Whether a datagram from `from` of `len` bytes may enter the queue.
#[inline]
pub fn accept_datagram(from: SocketAddr, peer: SocketAddr, len: usize) -> bool {
    from == peer && len > 0
}

/// Connected UDP socket plus its inbound queue.
///
/// Dropping the link aborts the receive task and releases the socket.
pub struct UdpLink {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    inbound: mpsc::Receiver<Bytes>,
    reader: JoinHandle<()>,
}

impl UdpLink {
    /// Bind an ephemeral local port, connect it to `peer` and start receiving.
    pub async fn open(peer: SocketAddr, queue_capacity: usize) -> Result<Self> {
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        let socket = Arc::new(socket);

        let (tx, inbound) = mpsc::channel(queue_capacity.max(1));
        let reader = tokio::spawn(receive_loop(socket.clone(), peer, tx));

        Ok(Self {
            socket,
            peer,
            inbound,
            reader,
        })
    }

    /// Remote peer address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Transmit one datagram to the peer.
    pub async fn send(&self, packet: &[u8]) -> Result<()> {
        self.socket.send(packet).await?;
        Ok(())
    }

    /// Wait for the next queued datagram.
    ///
    /// Returns `None` once the receive task has stopped.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inbound.recv().await
    }

    /// Discard everything currently queued. Returns the number dropped.
    pub fn flush(&mut self) -> usize {
        let mut dropped = 0;
        while self.inbound.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

impl Drop for UdpLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Receive errors that leave the socket usable.
fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}

async fn receive_loop(socket: Arc<UdpSocket>, peer: SocketAddr, tx: mpsc::Sender<Bytes>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (n, from) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) if is_transient(&e) => {
                // ICMP port unreachable from an earlier send
                tracing::debug!("Peer {} refused datagram: {}", peer, e);
                continue;
            }
            Err(e) => {
                // Dropping `tx` closes the queue; pending commands see `None`
                tracing::error!("Transport error, receive task stopping: {}", e);
                return;
            }
        };

        if !accept_datagram(from, peer, n) {
            tracing::debug!("Filtered {} byte datagram from {}", n, from);
            continue;
        }

        match tx.try_send(Bytes::copy_from_slice(&buf[..n])) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Inbound queue full, dropping {} byte datagram", n);
            }
            Err(TrySendError::Closed(_)) => return,
        }
    }
}
