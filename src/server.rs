//! # Server Context
//!
//! Process-wide state shared read-only by every session: the server GUID, MTU bounds,
//! the padded local-address tables advertised in CONNECTION_REQUEST_ACCEPTED, the
//! session registry and metrics.
//!
//! [`Server::on_datagram`] is the entry point for inbound datagrams. It answers
//! OPEN_CONNECTION_REQUEST_1 itself (creating the session) and hands every other
//! packet to the session registered for the sender's address.
//!
//! ## Usage
//! ```rust
//! use raknet_handshake::config::ServerConfig;
//! use raknet_handshake::server::Server;
//! use raknet_handshake::transport::{ChannelTransport, SessionTransport};
//! use std::sync::Arc;
//!
//! let server = Server::new(ServerConfig::default()).unwrap();
//! let (transport, mut outbound) = ChannelTransport::new();
//! let transport: Arc<dyn SessionTransport> = Arc::new(transport);
//!
//! // A stray packet from an unknown address is dropped without a reply.
//! server
//!     .on_datagram("127.0.0.1:50000".parse().unwrap(), vec![0x09].into(), &transport)
//!     .unwrap();
//! assert!(outbound.try_recv().is_err());
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::core::packet::{OpenConnectionRequest1, PacketId, LOCAL_ADDRESS_SLOTS};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handshake::clamp_mtu;
use crate::protocol::session::{DisconnectReason, ServerSession, Session};
use crate::transport::{SessionRegistry, SessionTransport};
use crate::utils::metrics::Metrics;

/// UDP header size added to the probe datagram when deriving the requested MTU
pub const UDP_HEADER_SIZE: usize = 8;
const IPV4_HEADER_SIZE: usize = 20;
const IPV6_HEADER_SIZE: usize = 40;

/// Padding for unused IPv4 local-address slots
pub const IPV4_SENTINEL_ADDRESS: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
/// Padding for unused IPv6 local-address slots
pub const IPV6_SENTINEL_ADDRESS: SocketAddr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0);

pub struct Server {
    guid: u64,
    config: ServerConfig,
    local_addresses_v4: Vec<SocketAddr>,
    local_addresses_v6: Vec<SocketAddr>,
    registry: SessionRegistry<ServerSession>,
    metrics: Metrics,
}

impl Server {
    /// Build the server context, generating a GUID if the configuration has none.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ProtocolError::ConfigError(errors.join("; ")));
        }

        let guid = config.guid.unwrap_or_else(rand::random::<u64>);
        let local_addresses_v4 =
            pad_local_addresses(&config.local_addresses_v4, IPV4_SENTINEL_ADDRESS);
        let local_addresses_v6 =
            pad_local_addresses(&config.local_addresses_v6, IPV6_SENTINEL_ADDRESS);

        info!(
            guid,
            minimum_mtu = config.minimum_mtu,
            maximum_mtu = config.maximum_mtu,
            protocol_version = config.protocol_version,
            "Handshake server initialized"
        );

        Ok(Arc::new(Self {
            guid,
            config,
            local_addresses_v4,
            local_addresses_v6,
            registry: SessionRegistry::new(),
            metrics: Metrics::new(),
        }))
    }

    #[inline]
    pub fn guid(&self) -> u64 {
        self.guid
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn registry(&self) -> &SessionRegistry<ServerSession> {
        &self.registry
    }

    /// Local-address table for the given family, always [`LOCAL_ADDRESS_SLOTS`] long.
    pub fn local_addresses(&self, ipv6: bool) -> &[SocketAddr] {
        if ipv6 {
            &self.local_addresses_v6
        } else {
            &self.local_addresses_v4
        }
    }

    /// Clamp a requested MTU into the configured bounds
    #[inline]
    pub fn clamp_mtu(&self, requested: u32) -> u16 {
        clamp_mtu(requested, self.config.minimum_mtu, self.config.maximum_mtu)
    }

    pub fn session(&self, addr: &SocketAddr) -> Option<Arc<ServerSession>> {
        self.registry.get(addr)
    }

    /// Register a session for `addr` unless one exists already.
    ///
    /// Returns the registered session and whether this call created it.
    pub fn accept_session(
        self: &Arc<Self>,
        addr: SocketAddr,
        mtu: u16,
        transport: &Arc<dyn SessionTransport>,
    ) -> (Arc<ServerSession>, bool) {
        let (session, created) = self.registry.insert_if_absent(addr, || {
            Arc::new(ServerSession::new(self.clone(), addr, mtu, transport.clone()))
        });
        if created {
            self.metrics.session_created();
            debug!(peer = %addr, mtu = session.mtu(), "Session created");
        }
        (session, created)
    }

    /// Close every registered session with [`DisconnectReason::ShuttingDown`].
    ///
    /// Sessions hold the server context, so a server with live sessions is only
    /// freed once they are closed. Returns how many sessions this call closed.
    pub fn shutdown(&self) -> usize {
        let closed = self
            .registry
            .sessions()
            .into_iter()
            .filter(|session| session.close_if_open(DisconnectReason::ShuttingDown))
            .count();
        info!(closed, "Handshake server shut down");
        self.metrics.log_metrics();
        closed
    }

    /// Handle one inbound datagram from `from`.
    ///
    /// Returns `Err` only for malformed datagrams; the caller logs and drops them.
    pub fn on_datagram(
        self: &Arc<Self>,
        from: SocketAddr,
        payload: Bytes,
        transport: &Arc<dyn SessionTransport>,
    ) -> Result<()> {
        let Some(&id) = payload.first() else {
            return Err(ProtocolError::EmptyPacket);
        };

        if PacketId::from_u8(id) == Some(PacketId::OpenConnectionRequest1) {
            return self.on_open_connection_request_1(from, payload, transport);
        }

        match self.registry.get(&from) {
            Some(session) => session.on_packet(payload),
            None => {
                debug!(peer = %from, id, "{}", constants::DROP_NO_SESSION);
                self.metrics.packet_dropped();
                Ok(())
            }
        }
    }

    fn on_open_connection_request_1(
        self: &Arc<Self>,
        from: SocketAddr,
        payload: Bytes,
        transport: &Arc<dyn SessionTransport>,
    ) -> Result<()> {
        let datagram_len = payload.len();
        let mut buf = payload;
        buf.advance(1);
        let request = OpenConnectionRequest1::decode(&mut buf)?;

        if !request.magic_valid {
            debug!(peer = %from, "{}", constants::DROP_INVALID_MAGIC);
            self.metrics.packet_dropped();
            return Ok(());
        }

        if request.protocol_version != self.config.protocol_version {
            debug!(
                peer = %from,
                version = request.protocol_version,
                expected = self.config.protocol_version,
                "{}",
                constants::DROP_PROTOCOL_VERSION
            );
            self.metrics.packet_dropped();
            return Ok(());
        }

        let ip_header = if from.is_ipv6() {
            IPV6_HEADER_SIZE
        } else {
            IPV4_HEADER_SIZE
        };
        let requested = datagram_len + UDP_HEADER_SIZE + ip_header;
        let mtu = self.clamp_mtu(u32::try_from(requested).unwrap_or(u32::MAX));

        let (session, _) = self.accept_session(from, mtu, transport);
        session.on_open_connection_request_1();
        Ok(())
    }
}

/// Take the configured addresses and pad with `sentinel` to exactly
/// [`LOCAL_ADDRESS_SLOTS`] entries.
fn pad_local_addresses(configured: &[SocketAddr], sentinel: SocketAddr) -> Vec<SocketAddr> {
    configured
        .iter()
        .copied()
        .chain(std::iter::repeat(sentinel))
        .take(LOCAL_ADDRESS_SLOTS)
        .collect()
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("guid", &self.guid)
            .field("sessions", &self.registry.len())
            .finish_non_exhaustive()
    }
}
