use bytes::{Buf, Bytes};
use tracing::debug;

use crate::core::packet::PacketId;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::session::{ServerSession, Session};

impl ServerSession {
    /// Route one session-scoped datagram by its leading id byte.
    ///
    /// Holds the session lock for the whole handler so state checks and the mutation
    /// that follows them are atomic per session. Unknown ids, and anything arriving
    /// after close, are dropped.
    pub(crate) fn dispatch(&self, payload: Bytes) -> Result<()> {
        let mut buf = payload;
        if !buf.has_remaining() {
            return Err(ProtocolError::EmptyPacket);
        }
        let id = buf.get_u8();

        let mut inner = self.core().lock();
        if inner.state.is_closed() {
            debug!(peer = %self.address(), id, "{}", constants::DROP_SESSION_CLOSED);
            self.server().metrics().packet_dropped();
            return Ok(());
        }

        match PacketId::from_u8(id) {
            Some(PacketId::OpenConnectionRequest2) => {
                self.on_open_connection_request_2(&mut inner, &mut buf)
            }
            Some(PacketId::ConnectionRequest) => self.on_connection_request(&mut inner, &mut buf),
            Some(PacketId::NewIncomingConnection) => {
                self.on_new_incoming_connection(&mut inner);
                Ok(())
            }
            _ => {
                debug!(peer = %self.address(), id, "{}", constants::DROP_UNKNOWN_PACKET);
                self.server().metrics().packet_dropped();
                Ok(())
            }
        }
    }
}
