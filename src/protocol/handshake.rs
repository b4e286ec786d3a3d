//! Server-side connection handshake.
//!
//! ```text
//! INITIALIZING --OPEN_CONNECTION_REQUEST_2--> INITIALIZED   (reply 2, direct)
//! INITIALIZED  --CONNECTION_REQUEST---------> CONNECTING    (accepted, queued/immediate)
//! CONNECTING   --NEW_INCOMING_CONNECTION----> CONNECTED     (no reply)
//! any          --close----------------------> CLOSED        (deregister)
//! ```
//!
//! Every handler runs with the session lock held. Anything a peer can get wrong is a
//! silent drop, except a bad CONNECTION_REQUEST, which gets exactly one
//! CONNECTION_REQUEST_FAILED before the session is closed.

use bytes::Buf;
use tracing::{debug, info, instrument, trace};

use crate::core::packet::{
    ConnectionRequest, ConnectionRequestAccepted, ConnectionRequestFailed, OpenConnectionReply1,
    OpenConnectionReply2, OpenConnectionRequest2,
};
use crate::error::{constants, Result};
use crate::protocol::session::{DisconnectReason, ServerSession, Session, SessionInner};
use crate::protocol::state::SessionState;
use crate::transport::Priority;
use crate::utils::time::current_timestamp;

/// Reserved system index field of CONNECTION_REQUEST_ACCEPTED
pub const SYSTEM_INDEX: u16 = 0;

/// Clamp a requested MTU into `[minimum, maximum]`.
#[inline]
pub fn clamp_mtu(requested: u32, minimum: u16, maximum: u16) -> u16 {
    requested.clamp(u32::from(minimum), u32::from(maximum)) as u16
}

impl ServerSession {
    /// Answer (or re-answer) OPEN_CONNECTION_REQUEST_1 while still negotiating.
    #[instrument(level = "trace", skip(self), fields(peer = %self.address()))]
    pub(crate) fn on_open_connection_request_1(&self) {
        let inner = self.core().lock();
        if inner.state != SessionState::Initializing {
            debug!(state = %inner.state, "{}", constants::DROP_INCORRECT_STATE);
            self.server().metrics().packet_dropped();
            return;
        }
        self.send_open_connection_reply_1(&inner);
    }

    #[instrument(level = "trace", skip_all, fields(peer = %self.address()))]
    pub(crate) fn on_open_connection_request_2<B: Buf>(
        &self,
        inner: &mut SessionInner,
        buf: &mut B,
    ) -> Result<()> {
        if inner.state != SessionState::Initializing {
            debug!(state = %inner.state, "{}", constants::DROP_INCORRECT_STATE);
            self.server().metrics().packet_dropped();
            return Ok(());
        }

        let Some(request) = OpenConnectionRequest2::decode(buf)? else {
            debug!("{}", constants::DROP_INVALID_MAGIC);
            self.server().metrics().packet_dropped();
            return Ok(());
        };

        inner.mtu = self.server().clamp_mtu(u32::from(request.mtu));
        inner.guid = Some(request.client_guid);
        // Connected-phase datagrams may flow from here on.
        inner.accepts_datagrams = true;

        self.send_open_connection_reply_2(inner);
        self.set_state(inner, SessionState::Initialized);
        Ok(())
    }

    #[instrument(level = "trace", skip_all, fields(peer = %self.address()))]
    pub(crate) fn on_connection_request<B: Buf>(
        &self,
        inner: &mut SessionInner,
        buf: &mut B,
    ) -> Result<()> {
        let request = ConnectionRequest::decode(buf)?;

        if inner.guid != Some(request.client_guid) || request.security {
            let reason = if request.security {
                constants::ERR_SECURITY_REQUESTED
            } else {
                constants::ERR_GUID_MISMATCH
            };
            debug!(guid = request.client_guid, "{reason}");
            self.server().metrics().handshake_failed();
            self.send_connection_failure();
            self.close_locked(inner, DisconnectReason::Disconnected);
            return Ok(());
        }

        match inner.state {
            SessionState::Initialized => {
                self.set_state(inner, SessionState::Connecting);
            }
            // The accepted reply was lost; answer the retransmission again.
            SessionState::Connecting => {
                trace!("Duplicate connection request");
            }
            state => {
                debug!(%state, "{}", constants::DROP_INCORRECT_STATE);
                self.server().metrics().packet_dropped();
                return Ok(());
            }
        }

        self.send_connection_request_accepted(request.timestamp);
        Ok(())
    }

    #[instrument(level = "trace", skip_all, fields(peer = %self.address()))]
    pub(crate) fn on_new_incoming_connection(&self, inner: &mut SessionInner) {
        if inner.state != SessionState::Connecting {
            debug!(state = %inner.state, "{}", constants::DROP_INCORRECT_STATE);
            self.server().metrics().packet_dropped();
            return;
        }

        self.set_state(inner, SessionState::Connected);
        self.server().metrics().handshake_completed();
        info!(guid = ?inner.guid, mtu = inner.mtu, "Session connected");
    }

    fn send_open_connection_reply_1(&self, inner: &SessionInner) {
        let reply = OpenConnectionReply1 {
            server_guid: self.server().guid(),
            mtu: inner.mtu,
        };
        let mut buffer = self.allocate_buffer(reply.encoded_len());
        reply.encode(&mut buffer);

        trace!(mtu = inner.mtu, "Sending open connection reply 1");
        self.send_direct(buffer);
    }

    fn send_open_connection_reply_2(&self, inner: &SessionInner) {
        let reply = OpenConnectionReply2 {
            server_guid: self.server().guid(),
            client_address: self.address(),
            mtu: inner.mtu,
        };
        let mut buffer = self.allocate_buffer(reply.encoded_len());
        reply.encode(&mut buffer);

        trace!(mtu = inner.mtu, "Sending open connection reply 2");
        self.send_direct(buffer);
    }

    fn send_connection_failure(&self) {
        let reply = ConnectionRequestFailed {
            server_guid: self.server().guid(),
        };
        let mut buffer = self.allocate_buffer(reply.encoded_len());
        reply.encode(&mut buffer);

        trace!("Sending connection request failed");
        self.send_direct(buffer);
    }

    fn send_connection_request_accepted(&self, client_timestamp: u64) {
        let reply = ConnectionRequestAccepted {
            client_address: self.address(),
            system_index: SYSTEM_INDEX,
            local_addresses: self.server().local_addresses(self.is_ipv6_session()),
            client_timestamp,
            server_timestamp: current_timestamp(),
        };
        let mut buffer = self.allocate_buffer(reply.encoded_len());
        reply.encode(&mut buffer);

        trace!(client_timestamp, "Sending connection request accepted");
        self.send(buffer, Priority::Immediate);
    }
}
