//! Per-peer session state and the server-side session type.
//!
//! Shared state lives in [`SessionCore`]; [`ServerSession`] composes it with the owning
//! [`Server`] and the outbound [`SessionTransport`]. All handlers for one session run
//! under the core's mutex, so packets for the same peer are processed one at a time
//! while distinct peers proceed independently.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::state::SessionState;
use crate::server::Server;
use crate::transport::{Priority, SessionTransport};

/// Why a session was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Closed locally, including a rejected connection request
    Disconnected,
    /// Peer sent a disconnection notification
    ClosedByRemotePeer,
    /// Idle timeout expired
    TimedOut,
    /// Server is shutting down
    ShuttingDown,
}

/// Capability interface of a session as seen by the datagram layer.
pub trait Session: Send + Sync {
    /// Handle one inbound session-scoped datagram (leading id byte included).
    ///
    /// Protocol anomalies are dropped and reported as `Ok(())`. An `Err` means the
    /// datagram was malformed and nothing was changed.
    fn on_packet(&self, payload: Bytes) -> Result<()>;

    /// Called exactly once when the session reaches `Closed`.
    fn on_close(&self, reason: DisconnectReason);

    /// The server context that owns this session
    fn server(&self) -> &Arc<Server>;
}

/// Mutable handshake state, guarded by [`SessionCore`]
#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) mtu: u16,
    pub(crate) guid: Option<u64>,
    pub(crate) accepts_datagrams: bool,
}

/// State shared by every session variant
#[derive(Debug)]
pub struct SessionCore {
    remote_address: SocketAddr,
    ipv6: bool,
    inner: Mutex<SessionInner>,
}

impl SessionCore {
    pub(crate) fn new(remote_address: SocketAddr, mtu: u16) -> Self {
        Self {
            remote_address,
            ipv6: remote_address.is_ipv6(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Initializing,
                mtu,
                guid: None,
                accepts_datagrams: false,
            }),
        }
    }

    #[inline]
    pub fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    #[inline]
    pub fn is_ipv6(&self) -> bool {
        self.ipv6
    }

    /// Lock the handshake state for the duration of one handler.
    ///
    /// A poisoned lock is recovered: the only panic raised while it is held is the
    /// fatal registry check, after which the state is already `Closed`.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The single server-side session variant.
pub struct ServerSession {
    core: SessionCore,
    server: Arc<Server>,
    transport: Arc<dyn SessionTransport>,
}

impl ServerSession {
    pub(crate) fn new(
        server: Arc<Server>,
        remote_address: SocketAddr,
        mtu: u16,
        transport: Arc<dyn SessionTransport>,
    ) -> Self {
        let mtu = server.clamp_mtu(u32::from(mtu));
        Self {
            core: SessionCore::new(remote_address, mtu),
            server,
            transport,
        }
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn address(&self) -> SocketAddr {
        self.core.remote_address()
    }

    pub fn is_ipv6_session(&self) -> bool {
        self.core.is_ipv6()
    }

    pub fn state(&self) -> SessionState {
        self.core.lock().state
    }

    pub fn mtu(&self) -> u16 {
        self.core.lock().mtu
    }

    /// Peer GUID captured from OPEN_CONNECTION_REQUEST_2
    pub fn guid(&self) -> Option<u64> {
        self.core.lock().guid
    }

    /// Whether connected-phase datagrams are accepted for this session.
    ///
    /// Set once OPEN_CONNECTION_REQUEST_2 is answered and cleared on close. The
    /// reliability layer reads it before decoding framed datagrams for this peer;
    /// handshake packets routed by [`Session::on_packet`] are gated by state instead.
    pub fn accepts_datagrams(&self) -> bool {
        self.core.lock().accepts_datagrams
    }

    /// Close the session and deregister it from the server.
    ///
    /// # Panics
    /// If the session is no longer registered under its address, e.g. when it was
    /// already closed.
    pub fn close(&self, reason: DisconnectReason) {
        let mut inner = self.core.lock();
        self.close_locked(&mut inner, reason);
    }

    /// Close the session unless it is already closed.
    ///
    /// The state check and the close happen under one lock, so this is safe to race
    /// with packet handlers and other sweeps. Returns whether this call closed it.
    pub fn close_if_open(&self, reason: DisconnectReason) -> bool {
        let mut inner = self.core.lock();
        if inner.state.is_closed() {
            return false;
        }
        self.close_locked(&mut inner, reason);
        true
    }

    pub(crate) fn close_locked(&self, inner: &mut SessionInner, reason: DisconnectReason) {
        if inner.state.is_closed() {
            warn!(peer = %self.address(), "Close requested on a session that is already closed");
        }
        inner.state = SessionState::Closed;
        inner.accepts_datagrams = false;
        self.on_close(reason);
    }

    /// Advance `inner` to `next`, refusing any transition the state machine forbids.
    pub(crate) fn set_state(&self, inner: &mut SessionInner, next: SessionState) -> bool {
        if !inner.state.can_transition_to(next) {
            debug!(
                peer = %self.address(),
                from = %inner.state,
                to = %next,
                "Refusing illegal state transition"
            );
            return false;
        }
        debug!(peer = %self.address(), from = %inner.state, to = %next, "Session state changed");
        inner.state = next;
        true
    }

    pub(crate) fn allocate_buffer(&self, capacity: usize) -> BytesMut {
        self.transport.allocate_buffer(capacity)
    }

    /// Send bypassing the reliability layer
    pub(crate) fn send_direct(&self, buffer: BytesMut) {
        self.transport.send_direct(self.address(), buffer.freeze());
        self.server.metrics().reply_sent();
    }

    /// Send through the reliability layer
    pub(crate) fn send(&self, buffer: BytesMut, priority: Priority) {
        self.transport.send(self.address(), buffer.freeze(), priority);
        self.server.metrics().reply_sent();
    }
}

impl Session for ServerSession {
    fn on_packet(&self, payload: Bytes) -> Result<()> {
        self.dispatch(payload)
    }

    fn on_close(&self, reason: DisconnectReason) {
        info!(peer = %self.address(), ?reason, "Session closed");
        self.server.metrics().session_closed();
        self.server.registry().deregister(&self.address(), self);
    }

    fn server(&self) -> &Arc<Server> {
        &self.server
    }
}

impl std::fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSession")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}
