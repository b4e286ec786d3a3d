//! # Transport Collaborators
//!
//! The handshake core never touches a socket. Replies are handed to a
//! [`SessionTransport`], which owns the datagram channel and (for queued sends) the
//! reliability layer. Sessions are tracked in the address-keyed [`SessionRegistry`].
//!
//! ## Send Paths
//! - **Direct**: raw datagram, bypassing reliability. Used before the session is
//!   initialized (open-connection replies, connection failure).
//! - **Queued**: handed to the reliability layer with an explicit [`Priority`].
//!
//! ## Inbound Gating
//! The reliability layer must only decode framed (connected-phase) datagrams for a
//! peer whose session reports
//! [`accepts_datagrams`](crate::protocol::ServerSession::accepts_datagrams). The flag
//! turns on when OPEN_CONNECTION_REQUEST_2 is answered and off at close.

pub mod channel;
pub mod registry;

use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;

pub use channel::{ChannelTransport, OutboundDatagram};
pub use registry::SessionRegistry;

/// Send priority for the queued path, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Immediate,
    High,
    Medium,
    Low,
}

/// Which path a reply took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPath {
    Direct,
    Queued(Priority),
}

/// Outbound side of a session: buffer allocation and best-effort sends.
///
/// Sends are fire-and-forget. Implementations must not block.
pub trait SessionTransport: Send + Sync {
    /// Allocate a buffer for a reply of `capacity` bytes.
    fn allocate_buffer(&self, capacity: usize) -> BytesMut {
        BytesMut::with_capacity(capacity)
    }

    /// Send a datagram without the reliability layer.
    fn send_direct(&self, to: SocketAddr, buffer: Bytes);

    /// Queue a datagram on the reliability layer.
    fn send(&self, to: SocketAddr, buffer: Bytes, priority: Priority);
}
