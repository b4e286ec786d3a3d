use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use raknet_handshake::config::ServerConfig;
use raknet_handshake::core::codec::{read_address, write_address, UNCONNECTED_MAGIC};
use raknet_handshake::core::packet::PacketId;
use raknet_handshake::server::Server;
use raknet_handshake::transport::{ChannelTransport, SessionTransport};
use raknet_handshake::Session;

#[allow(clippy::unwrap_used)]
fn bench_address_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("address_codec");
    let addrs: [SocketAddr; 2] = [
        "192.168.10.20:19132".parse().unwrap(),
        "[2001:db8::42]:19133".parse().unwrap(),
    ];

    for addr in addrs {
        let family = if addr.is_ipv6() { "v6" } else { "v4" };
        group.bench_function(format!("encode_{family}"), |b| {
            let mut buf = BytesMut::with_capacity(32);
            b.iter(|| {
                buf.clear();
                write_address(&mut buf, &addr);
            })
        });
        group.bench_function(format!("decode_{family}"), |b| {
            let mut buf = BytesMut::new();
            write_address(&mut buf, &addr);
            let encoded = buf.freeze();
            b.iter(|| {
                let mut reader = encoded.clone();
                read_address(&mut reader).unwrap()
            })
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_full_handshake(c: &mut Criterion) {
    let server = Server::new(ServerConfig::default()).unwrap();
    let (transport, mut rx) = ChannelTransport::new();
    let transport: Arc<dyn SessionTransport> = Arc::new(transport);

    let mut open = BytesMut::new();
    open.put_u8(PacketId::OpenConnectionRequest2.as_u8());
    open.put_slice(&UNCONNECTED_MAGIC);
    write_address(&mut open, &"10.0.0.1:19132".parse().unwrap());
    open.put_u16(1400);
    open.put_u64(1);
    let open = open.freeze();

    let mut request = BytesMut::new();
    request.put_u8(PacketId::ConnectionRequest.as_u8());
    request.put_u64(1);
    request.put_u64(0);
    request.put_u8(0);
    let request = request.freeze();

    let incoming = Bytes::from_static(&[PacketId::NewIncomingConnection as u8]);
    let mut port = 0u16;

    c.bench_function("handshake_open_to_connected", |b| {
        b.iter_batched(
            || {
                port = port.wrapping_add(1);
                let addr = SocketAddr::from(([10, 0, 0, 2], port));
                if let Some(stale) = server.session(&addr) {
                    stale.close(raknet_handshake::DisconnectReason::Disconnected);
                }
                server.accept_session(addr, 1400, &transport).0
            },
            |session| {
                session.on_packet(open.clone()).unwrap();
                session.on_packet(request.clone()).unwrap();
                session.on_packet(incoming.clone()).unwrap();
                while rx.try_recv().is_ok() {}
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_address_codec, bench_full_handshake);
criterion_main!(benches);
