//! # Error Types
//!
//! Error handling for the handshake core.
//!
//! Protocol anomalies on the wire (bad magic, wrong-state packets, GUID mismatches,
//! security flag set) are *not* errors: they are expected on an unreliable, possibly
//! hostile medium and are dropped or answered inside the state machine. The variants
//! here cover the remaining failure modes:
//!
//! - **Decode Errors**: a datagram too short for the layout it claims
//! - **Configuration Errors**: invalid or unreadable configuration
//! - **I/O Errors**: file system failures while loading configuration
//!
//! ## Example Usage
//! ```rust
//! use raknet_handshake::core::codec::read_address;
//! use raknet_handshake::error::ProtocolError;
//!
//! let mut buf: &[u8] = &[4, 0x80];
//! match read_address(&mut buf) {
//!     Err(ProtocolError::Truncated { needed, .. }) => assert_eq!(needed, 6),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Static messages shared by log lines and error paths.
pub mod constants {
    /// Drop reasons
    pub const DROP_INCORRECT_STATE: &str = "Incorrect state";
    pub const DROP_INVALID_MAGIC: &str = "Invalid magic";
    pub const DROP_UNKNOWN_PACKET: &str = "Unknown packet id";
    pub const DROP_SESSION_CLOSED: &str = "Session already closed";
    pub const DROP_PROTOCOL_VERSION: &str = "Unsupported protocol version";
    pub const DROP_NO_SESSION: &str = "No session for address";

    /// Handshake failures
    pub const ERR_GUID_MISMATCH: &str = "Peer GUID does not match the negotiated GUID";
    pub const ERR_SECURITY_REQUESTED: &str = "Peer requested an unsupported secure connection";

    /// Registry bookkeeping
    pub const ERR_REGISTRY_INCONSISTENT: &str =
        "Session was not registered under its own address at close";

    /// Time
    pub const ERR_SYSTEM_TIME: &str = "System time error: time went backwards";
}

/// ProtocolError is the primary error type for all handshake operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated packet: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Invalid address family: {0}")]
    InvalidAddressFamily(u8),

    #[error("Empty packet")]
    EmptyPacket,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
