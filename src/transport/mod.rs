//! Transport module - datagram socket handling.
//!
//! Provides a connected UDP socket with an inbound queue fed by a
//! background receive task.

mod udp;

pub use udp::{accept_datagram, UdpLink, DEFAULT_QUEUE_CAPACITY};
