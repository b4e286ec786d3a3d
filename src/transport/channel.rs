//! Channel-backed [`SessionTransport`].
//!
//! Outbound datagrams are pushed onto a tokio unbounded channel, to be drained by
//! whichever task owns the socket (and, for queued sends, the reliability layer).

use crate::transport::{Priority, SendPath, SessionTransport};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::warn;

/// A reply waiting to be written to the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundDatagram {
    pub to: SocketAddr,
    pub payload: Bytes,
    pub path: SendPath,
}

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundDatagram>,
}

impl ChannelTransport {
    /// Create a transport and the receiving end of its outbound queue
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundDatagram>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, datagram: OutboundDatagram) {
        // Best effort: a closed receiver means the socket task is gone.
        if self.tx.send(datagram).is_err() {
            warn!("Outbound channel closed, dropping datagram");
        }
    }
}

impl SessionTransport for ChannelTransport {
    fn send_direct(&self, to: SocketAddr, buffer: Bytes) {
        self.push(OutboundDatagram {
            to,
            payload: buffer,
            path: SendPath::Direct,
        });
    }

    fn send(&self, to: SocketAddr, buffer: Bytes, priority: Priority) {
        self.push(OutboundDatagram {
            to,
            payload: buffer,
            path: SendPath::Queued(priority),
        });
    }
}
