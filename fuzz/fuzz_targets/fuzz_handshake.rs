#![no_main]

use std::sync::Arc;

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use raknet_handshake::config::ServerConfig;
use raknet_handshake::server::Server;
use raknet_handshake::transport::{ChannelTransport, SessionTransport};

/// Split `data` into length-prefixed datagrams: one length byte, then that many bytes.
/// A short final chunk takes whatever is left.
fn datagrams(mut data: &[u8]) -> impl Iterator<Item = &[u8]> {
    std::iter::from_fn(move || {
        let (&len, rest) = data.split_first()?;
        let (datagram, tail) = rest.split_at(usize::from(len).min(rest.len()));
        data = tail;
        Some(datagram)
    })
}

fuzz_target!(|data: &[u8]| {
    let Ok(server) = Server::new(ServerConfig::default()) else {
        return;
    };
    let (transport, _rx) = ChannelTransport::new();
    let transport: Arc<dyn SessionTransport> = Arc::new(transport);
    let peer = "10.0.0.1:19132".parse().expect("valid address");

    for datagram in datagrams(data) {
        let _ = server.on_datagram(peer, Bytes::copy_from_slice(datagram), &transport);
    }

    server.shutdown();
});
