// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::{ServerConfig, MAXIMUM_MTU_SIZE, MINIMUM_MTU_SIZE};
use crate::core::codec::{read_address, write_address, write_magic, UNCONNECTED_MAGIC};
use crate::core::packet::{ConnectionRequestFailed, PacketId, LOCAL_ADDRESS_SLOTS};
use crate::protocol::{DisconnectReason, ServerSession, Session, SessionState};
use crate::server::Server;
use crate::transport::{ChannelTransport, OutboundDatagram, Priority, SendPath, SessionTransport};

const SERVER_GUID: u64 = 0x5E5E_0000_0000_0001;
const CLIENT_GUID: u64 = 0x1234_5678_9ABC_DEF0;

struct Harness {
    server: Arc<Server>,
    session: Arc<ServerSession>,
    outbound: UnboundedReceiver<OutboundDatagram>,
}

impl Harness {
    fn new(peer: &str) -> Self {
        let config = ServerConfig {
            guid: Some(SERVER_GUID),
            ..ServerConfig::default()
        };
        let server = Server::new(config).unwrap();
        let (transport, outbound) = ChannelTransport::new();
        let transport: Arc<dyn SessionTransport> = Arc::new(transport);
        let (session, created) =
            server.accept_session(peer.parse().unwrap(), MAXIMUM_MTU_SIZE, &transport);
        assert!(created);
        Self {
            server,
            session,
            outbound,
        }
    }

    fn ipv4() -> Self {
        Self::new("203.0.113.7:40000")
    }

    fn next_reply(&mut self) -> Option<OutboundDatagram> {
        self.outbound.try_recv().ok()
    }

    fn open_request_2(&mut self, mtu: u16) {
        self.session
            .on_packet(open_connection_request_2(mtu, CLIENT_GUID, &UNCONNECTED_MAGIC))
            .unwrap();
    }

    fn connection_request(&mut self, guid: u64, timestamp: u64, security: bool) {
        self.session
            .on_packet(connection_request(guid, timestamp, security))
            .unwrap();
    }

    fn new_incoming(&mut self) {
        self.session
            .on_packet(Bytes::from_static(&[PacketId::NewIncomingConnection as u8]))
            .unwrap();
    }
}

fn open_connection_request_2(mtu: u16, guid: u64, magic: &[u8; 16]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(PacketId::OpenConnectionRequest2.as_u8());
    buf.put_slice(magic);
    write_address(&mut buf, &"198.51.100.1:19132".parse().unwrap());
    buf.put_u16(mtu);
    buf.put_u64(guid);
    buf.freeze()
}

fn connection_request(guid: u64, timestamp: u64, security: bool) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(PacketId::ConnectionRequest.as_u8());
    buf.put_u64(guid);
    buf.put_u64(timestamp);
    buf.put_u8(u8::from(security));
    buf.freeze()
}

#[test]
fn test_open_connection_request_2_initializes() {
    let mut h = Harness::ipv4();
    h.open_request_2(1200);

    assert_eq!(h.session.state(), SessionState::Initialized);
    assert_eq!(h.session.mtu(), 1200);
    assert_eq!(h.session.guid(), Some(CLIENT_GUID));
    assert!(h.session.accepts_datagrams());

    let reply = h.next_reply().expect("reply 2 expected");
    assert_eq!(reply.path, SendPath::Direct);
    assert_eq!(reply.to, h.session.address());

    let bytes = reply.payload;
    assert_eq!(bytes.len(), 1 + 16 + 8 + 7 + 2 + 1);
    assert_eq!(bytes[0], PacketId::OpenConnectionReply2.as_u8());
    assert_eq!(&bytes[1..17], &UNCONNECTED_MAGIC);
    assert_eq!(&bytes[17..25], &SERVER_GUID.to_be_bytes());
    let mut addr_buf = bytes.slice(25..32);
    assert_eq!(read_address(&mut addr_buf).unwrap(), h.session.address());
    assert_eq!(&bytes[32..34], &1200u16.to_be_bytes());
    assert_eq!(bytes[34], 0);
    assert!(h.next_reply().is_none());
}

#[test]
fn test_invalid_magic_is_silent_noop() {
    let mut h = Harness::ipv4();
    let mut magic = UNCONNECTED_MAGIC;
    magic[0] = 0xAA;

    h.session
        .on_packet(open_connection_request_2(1200, CLIENT_GUID, &magic))
        .unwrap();

    assert_eq!(h.session.state(), SessionState::Initializing);
    assert_eq!(h.session.guid(), None);
    assert!(!h.session.accepts_datagrams());
    assert!(h.next_reply().is_none());
}

#[test]
fn test_mtu_clamped_to_bounds() {
    let mut high = Harness::ipv4();
    high.open_request_2(u16::MAX);
    assert_eq!(high.session.mtu(), MAXIMUM_MTU_SIZE);

    let mut low = Harness::ipv4();
    low.open_request_2(0);
    assert_eq!(low.session.mtu(), MINIMUM_MTU_SIZE);

    assert_eq!(low.server.clamp_mtu(70_000), MAXIMUM_MTU_SIZE);
    assert_eq!(low.server.clamp_mtu(0), MINIMUM_MTU_SIZE);
}

#[test]
fn test_replayed_open_request_2_ignored() {
    let mut h = Harness::ipv4();
    h.open_request_2(1200);
    h.next_reply().unwrap();

    h.session
        .on_packet(open_connection_request_2(900, 99, &UNCONNECTED_MAGIC))
        .unwrap();

    assert_eq!(h.session.state(), SessionState::Initialized);
    assert_eq!(h.session.mtu(), 1200);
    assert_eq!(h.session.guid(), Some(CLIENT_GUID));
    assert!(h.next_reply().is_none());
}

#[test]
fn test_connection_request_accepted() {
    let mut h = Harness::ipv4();
    h.open_request_2(1200);
    h.next_reply().unwrap();

    let before = crate::utils::time::current_timestamp();
    h.connection_request(CLIENT_GUID, 0x0102_0304_0506_0708, false);
    let after = crate::utils::time::current_timestamp();

    assert_eq!(h.session.state(), SessionState::Connecting);

    let reply = h.next_reply().expect("accepted reply expected");
    assert_eq!(reply.path, SendPath::Queued(Priority::Immediate));

    let bytes = reply.payload;
    let expected_len = 1 + 7 + 2 + LOCAL_ADDRESS_SLOTS * 7 + 8 + 8;
    assert_eq!(bytes.len(), expected_len);
    assert_eq!(bytes[0], PacketId::ConnectionRequestAccepted.as_u8());

    let mut addr_buf = bytes.slice(1..8);
    assert_eq!(read_address(&mut addr_buf).unwrap(), h.session.address());
    assert_eq!(&bytes[8..10], &[0, 0]);

    let timestamps = &bytes[expected_len - 16..];
    assert_eq!(&timestamps[..8], &0x0102_0304_0506_0708u64.to_be_bytes());
    let server_time = u64::from_be_bytes(timestamps[8..].try_into().unwrap());
    assert!(server_time >= before && server_time <= after);
}

#[test]
fn test_accepted_layout_ipv6() {
    let mut h = Harness::new("[2001:db8::5]:40000");
    h.open_request_2(1200);
    h.next_reply().unwrap();
    h.connection_request(CLIENT_GUID, 1, false);

    let reply = h.next_reply().unwrap();
    assert_eq!(reply.payload.len(), 1 + 29 + 2 + LOCAL_ADDRESS_SLOTS * 29 + 16);
}

#[test]
fn test_guid_mismatch_fails_and_closes() {
    let mut h = Harness::ipv4();
    h.open_request_2(1200);
    h.next_reply().unwrap();

    h.connection_request(CLIENT_GUID + 1, 5, false);

    let reply = h.next_reply().expect("failure reply expected");
    assert_eq!(reply.path, SendPath::Direct);
    assert_eq!(reply.payload.len(), ConnectionRequestFailed::SIZE);
    assert_eq!(reply.payload[0], PacketId::ConnectionRequestFailed.as_u8());
    assert_eq!(&reply.payload[17..25], &SERVER_GUID.to_be_bytes());
    assert!(h.next_reply().is_none());

    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(h.server.session(&h.session.address()).is_none());
    assert_eq!(h.server.metrics().snapshot().handshakes_failed, 1);
}

#[test]
fn test_security_flag_fails_and_closes() {
    let mut h = Harness::ipv4();
    h.open_request_2(1200);
    h.next_reply().unwrap();

    h.connection_request(CLIENT_GUID, 5, true);

    let reply = h.next_reply().unwrap();
    assert_eq!(reply.payload[0], PacketId::ConnectionRequestFailed.as_u8());
    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(h.server.registry().is_empty());
}

#[test]
fn test_connection_request_before_open_request_fails() {
    let mut h = Harness::ipv4();
    h.connection_request(CLIENT_GUID, 5, false);

    assert_eq!(
        h.next_reply().unwrap().payload[0],
        PacketId::ConnectionRequestFailed.as_u8()
    );
    assert_eq!(h.session.state(), SessionState::Closed);
}

#[test]
fn test_duplicate_connection_request_resends_accepted() {
    let mut h = Harness::ipv4();
    h.open_request_2(1200);
    h.next_reply().unwrap();
    h.connection_request(CLIENT_GUID, 10, false);
    h.next_reply().unwrap();

    h.connection_request(CLIENT_GUID, 11, false);

    assert_eq!(h.session.state(), SessionState::Connecting);
    let reply = h.next_reply().unwrap();
    assert_eq!(reply.payload[0], PacketId::ConnectionRequestAccepted.as_u8());
}

#[test]
fn test_connection_request_after_connected_dropped() {
    let mut h = Harness::ipv4();
    h.open_request_2(1200);
    h.connection_request(CLIENT_GUID, 10, false);
    h.new_incoming();
    while h.next_reply().is_some() {}

    h.connection_request(CLIENT_GUID, 12, false);

    assert_eq!(h.session.state(), SessionState::Connected);
    assert!(h.next_reply().is_none());
}

#[test]
fn test_new_incoming_connection_completes() {
    let mut h = Harness::ipv4();
    h.open_request_2(1200);
    h.connection_request(CLIENT_GUID, 10, false);
    while h.next_reply().is_some() {}

    h.new_incoming();

    assert_eq!(h.session.state(), SessionState::Connected);
    assert!(h.next_reply().is_none());
    assert_eq!(h.server.metrics().snapshot().handshakes_completed, 1);
}

#[test]
fn test_new_incoming_connection_out_of_order_ignored() {
    let mut h = Harness::ipv4();
    h.new_incoming();
    assert_eq!(h.session.state(), SessionState::Initializing);

    h.open_request_2(1200);
    h.next_reply().unwrap();
    h.new_incoming();
    assert_eq!(h.session.state(), SessionState::Initialized);
    assert!(h.next_reply().is_none());
}

#[test]
fn test_unknown_packet_dropped() {
    let mut h = Harness::ipv4();
    h.session.on_packet(Bytes::from_static(&[0x84, 1, 2, 3])).unwrap();
    h.session
        .on_packet(Bytes::from_static(&[PacketId::OpenConnectionReply1 as u8]))
        .unwrap();

    assert_eq!(h.session.state(), SessionState::Initializing);
    assert!(h.next_reply().is_none());
    assert_eq!(h.server.metrics().snapshot().packets_dropped, 2);
}

#[test]
fn test_truncated_packet_changes_nothing() {
    let mut h = Harness::ipv4();
    let full = open_connection_request_2(1200, CLIENT_GUID, &UNCONNECTED_MAGIC);

    assert!(h.session.on_packet(full.slice(..full.len() - 3)).is_err());
    assert!(h.session.on_packet(Bytes::new()).is_err());
    assert_eq!(h.session.state(), SessionState::Initializing);
    assert!(h.next_reply().is_none());
}

#[test]
fn test_close_deregisters_once() {
    let h = Harness::ipv4();
    let addr: SocketAddr = h.session.address();

    h.session.close(DisconnectReason::TimedOut);

    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(h.server.session(&addr).is_none());
    assert_eq!(h.server.metrics().snapshot().sessions_closed, 1);
}

#[test]
#[should_panic(expected = "not registered under its own address")]
fn test_second_close_is_fatal() {
    let h = Harness::ipv4();
    h.session.close(DisconnectReason::Disconnected);
    h.session.close(DisconnectReason::Disconnected);
}

#[test]
fn test_datagram_gate_follows_lifecycle() {
    let mut h = Harness::ipv4();
    assert!(!h.session.accepts_datagrams());

    h.open_request_2(1200);
    assert!(h.session.accepts_datagrams());

    h.session.close(DisconnectReason::TimedOut);
    assert!(!h.session.accepts_datagrams());
}

#[test]
fn test_close_if_open_closes_once() {
    let h = Harness::ipv4();

    assert!(h.session.close_if_open(DisconnectReason::TimedOut));
    assert!(!h.session.close_if_open(DisconnectReason::TimedOut));
    assert!(h.server.registry().is_empty());
    assert_eq!(h.server.metrics().snapshot().sessions_closed, 1);
}

#[test]
fn test_closed_session_drops_everything() {
    let mut h = Harness::ipv4();
    h.session.close(DisconnectReason::ShuttingDown);

    h.open_request_2(1200);
    h.connection_request(CLIENT_GUID, 1, false);

    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(h.next_reply().is_none());
}

#[test]
fn test_server_accessor_returns_owner() {
    let h = Harness::ipv4();
    assert!(Arc::ptr_eq(h.session.server(), &h.server));
    assert_eq!(h.session.server().guid(), SERVER_GUID);
}

#[test]
fn test_magic_write_matches_constant() {
    let mut buf = BytesMut::new();
    write_magic(&mut buf);
    assert_eq!(&buf[..], &UNCONNECTED_MAGIC);
}
