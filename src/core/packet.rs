//! Handshake packet identifiers and wire layouts.
//!
//! Requests are decoded from the payload *after* the leading id byte has been
//! consumed by the dispatcher. Replies encode their own id byte.

use crate::core::codec::{
    address_size, ensure_remaining, read_address, read_bool, read_magic, write_address,
    write_bool, write_magic, UNCONNECTED_MAGIC,
};
use crate::error::Result;
use bytes::{Buf, BufMut};
use std::net::SocketAddr;

/// Leading identifier byte of every handshake packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketId {
    OpenConnectionRequest1 = 0x05,
    OpenConnectionReply1 = 0x06,
    OpenConnectionRequest2 = 0x07,
    OpenConnectionReply2 = 0x08,
    ConnectionRequest = 0x09,
    ConnectionRequestAccepted = 0x10,
    ConnectionRequestFailed = 0x11,
    NewIncomingConnection = 0x13,
}

impl PacketId {
    /// Map a wire byte to a known id; unknown bytes yield `None`.
    pub fn from_u8(id: u8) -> Option<Self> {
        match id {
            0x05 => Some(Self::OpenConnectionRequest1),
            0x06 => Some(Self::OpenConnectionReply1),
            0x07 => Some(Self::OpenConnectionRequest2),
            0x08 => Some(Self::OpenConnectionReply2),
            0x09 => Some(Self::ConnectionRequest),
            0x10 => Some(Self::ConnectionRequestAccepted),
            0x11 => Some(Self::ConnectionRequestFailed),
            0x13 => Some(Self::NewIncomingConnection),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Number of local-address slots in `CONNECTION_REQUEST_ACCEPTED`, per family.
pub const LOCAL_ADDRESS_SLOTS: usize = 10;

/// Body of `OPEN_CONNECTION_REQUEST_1` (after the id byte).
///
/// The trailing zero padding is what carries the MTU probe; only its length matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionRequest1 {
    pub magic_valid: bool,
    pub protocol_version: u8,
    pub padding_len: usize,
}

impl OpenConnectionRequest1 {
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let magic_valid = read_magic(buf)?;
        ensure_remaining(buf, 1)?;
        let protocol_version = buf.get_u8();
        let padding_len = buf.remaining();
        buf.advance(padding_len);
        Ok(Self {
            magic_valid,
            protocol_version,
            padding_len,
        })
    }
}

/// Body of `OPEN_CONNECTION_REQUEST_2` (after the id byte).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionRequest2 {
    pub mtu: u16,
    pub client_guid: u64,
}

impl OpenConnectionRequest2 {
    /// Returns `Ok(None)` when the magic marker does not match.
    ///
    /// The peer-claimed server address is consumed and discarded.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Option<Self>> {
        if !read_magic(buf)? {
            return Ok(None);
        }
        read_address(buf)?;
        ensure_remaining(buf, 10)?;
        let mtu = buf.get_u16();
        let client_guid = buf.get_u64();
        Ok(Some(Self { mtu, client_guid }))
    }
}

/// Body of `CONNECTION_REQUEST` (after the id byte).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub client_guid: u64,
    pub timestamp: u64,
    pub security: bool,
}

impl ConnectionRequest {
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        ensure_remaining(buf, 16)?;
        let client_guid = buf.get_u64();
        let timestamp = buf.get_u64();
        let security = read_bool(buf)?;
        Ok(Self {
            client_guid,
            timestamp,
            security,
        })
    }
}

/// `OPEN_CONNECTION_REPLY_1`: id(1) + magic(16) + server guid(8) + security(1) + mtu(2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionReply1 {
    pub server_guid: u64,
    pub mtu: u16,
}

impl OpenConnectionReply1 {
    pub const SIZE: usize = 1 + 16 + 8 + 1 + 2;

    pub fn encoded_len(&self) -> usize {
        Self::SIZE
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(PacketId::OpenConnectionReply1.as_u8());
        write_magic(buf);
        buf.put_u64(self.server_guid);
        write_bool(buf, false);
        buf.put_u16(self.mtu);
    }
}

/// `OPEN_CONNECTION_REPLY_2`: id(1) + magic(16) + server guid(8) + peer address + mtu(2) + security(1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionReply2 {
    pub server_guid: u64,
    pub client_address: SocketAddr,
    pub mtu: u16,
}

impl OpenConnectionReply2 {
    pub fn encoded_len(&self) -> usize {
        1 + UNCONNECTED_MAGIC.len() + 8 + address_size(&self.client_address) + 2 + 1
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(PacketId::OpenConnectionReply2.as_u8());
        write_magic(buf);
        buf.put_u64(self.server_guid);
        write_address(buf, &self.client_address);
        buf.put_u16(self.mtu);
        write_bool(buf, false);
    }
}

/// `CONNECTION_REQUEST_FAILED`: id(1) + magic(16) + server guid(8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequestFailed {
    pub server_guid: u64,
}

impl ConnectionRequestFailed {
    pub const SIZE: usize = 1 + 16 + 8;

    pub fn encoded_len(&self) -> usize {
        Self::SIZE
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(PacketId::ConnectionRequestFailed.as_u8());
        write_magic(buf);
        buf.put_u64(self.server_guid);
    }
}

/// `CONNECTION_REQUEST_ACCEPTED`:
/// id(1) + peer address + system index(2) + 10 x local address + peer time(8) + server time(8)
///
/// `local_addresses` must already be padded to [`LOCAL_ADDRESS_SLOTS`] entries of the
/// peer's family so the layout is size-stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequestAccepted<'a> {
    pub client_address: SocketAddr,
    pub system_index: u16,
    pub local_addresses: &'a [SocketAddr],
    pub client_timestamp: u64,
    pub server_timestamp: u64,
}

impl ConnectionRequestAccepted<'_> {
    pub fn encoded_len(&self) -> usize {
        1 + address_size(&self.client_address)
            + 2
            + self.local_addresses.iter().map(address_size).sum::<usize>()
            + 8
            + 8
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(PacketId::ConnectionRequestAccepted.as_u8());
        write_address(buf, &self.client_address);
        buf.put_u16(self.system_index);
        for addr in self.local_addresses {
            write_address(buf, addr);
        }
        buf.put_u64(self.client_timestamp);
        buf.put_u64(self.server_timestamp);
    }
}
