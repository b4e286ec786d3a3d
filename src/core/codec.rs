//! Fixed-layout field codec shared by every handshake packet.
//!
//! All multi-byte integers are big-endian. Socket addresses use the RakNet layout:
//!
//! ```text
//! IPv4: [family=4(1)] [~octets(4)] [port(2)]                                   = 7 bytes
//! IPv6: [family=6(1)] [AF_INET6 LE(2)] [port(2)] [flowinfo(4)] [octets(16)] [scope id(4)] = 29 bytes
//! ```

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Offline-message magic marker identifying RakNet unconnected packets.
pub const UNCONNECTED_MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

/// Family tag for IPv4 addresses
pub const IPV4_FAMILY: u8 = 4;
/// Family tag for IPv6 addresses
pub const IPV6_FAMILY: u8 = 6;

/// Encoded size of an IPv4 socket address
pub const IPV4_ADDRESS_SIZE: usize = 7;
/// Encoded size of an IPv6 socket address
pub const IPV6_ADDRESS_SIZE: usize = 29;

// sockaddr_in6 family value written by the reference peers (Windows AF_INET6)
const AF_INET6: u16 = 23;

/// Fail with `Truncated` unless `buf` holds at least `needed` more bytes.
#[inline]
pub fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Encoded size of `addr` on the wire
#[inline]
pub fn address_size(addr: &SocketAddr) -> usize {
    match addr {
        SocketAddr::V4(_) => IPV4_ADDRESS_SIZE,
        SocketAddr::V6(_) => IPV6_ADDRESS_SIZE,
    }
}

/// Consume the magic marker and report whether it matched exactly.
///
/// Always advances past 16 bytes when they are present, so a mismatch leaves the
/// cursor in a well-defined position.
pub fn read_magic<B: Buf>(buf: &mut B) -> Result<bool> {
    ensure_remaining(buf, UNCONNECTED_MAGIC.len())?;
    let mut magic = [0u8; 16];
    buf.copy_to_slice(&mut magic);
    Ok(magic == UNCONNECTED_MAGIC)
}

#[inline]
pub fn write_magic<B: BufMut>(buf: &mut B) {
    buf.put_slice(&UNCONNECTED_MAGIC);
}

pub fn read_bool<B: Buf>(buf: &mut B) -> Result<bool> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8() != 0)
}

#[inline]
pub fn write_bool<B: BufMut>(buf: &mut B, value: bool) {
    buf.put_u8(u8::from(value));
}

/// Decode a socket address, consuming exactly the bytes its family dictates.
pub fn read_address<B: Buf>(buf: &mut B) -> Result<SocketAddr> {
    ensure_remaining(buf, 1)?;
    match buf.get_u8() {
        IPV4_FAMILY => {
            ensure_remaining(buf, IPV4_ADDRESS_SIZE - 1)?;
            let mut octets = [0u8; 4];
            buf.copy_to_slice(&mut octets);
            for octet in octets.iter_mut() {
                *octet = !*octet;
            }
            let port = buf.get_u16();
            Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(octets), port)))
        }
        IPV6_FAMILY => {
            ensure_remaining(buf, IPV6_ADDRESS_SIZE - 1)?;
            let _family = buf.get_u16_le();
            let port = buf.get_u16();
            let flowinfo = buf.get_u32();
            let mut octets = [0u8; 16];
            buf.copy_to_slice(&mut octets);
            let scope_id = buf.get_u32();
            Ok(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(octets),
                port,
                flowinfo,
                scope_id,
            )))
        }
        other => Err(ProtocolError::InvalidAddressFamily(other)),
    }
}

pub fn write_address<B: BufMut>(buf: &mut B, addr: &SocketAddr) {
    match addr {
        SocketAddr::V4(v4) => {
            buf.put_u8(IPV4_FAMILY);
            for octet in v4.ip().octets() {
                buf.put_u8(!octet);
            }
            buf.put_u16(v4.port());
        }
        SocketAddr::V6(v6) => {
            buf.put_u8(IPV6_FAMILY);
            buf.put_u16_le(AF_INET6);
            buf.put_u16(v6.port());
            buf.put_u32(v6.flowinfo());
            buf.put_slice(&v6.ip().octets());
            buf.put_u32(v6.scope_id());
        }
    }
}
