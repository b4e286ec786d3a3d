//! # RakNet Handshake
//!
//! Server side of the RakNet connection handshake: how an unauthenticated UDP peer
//! becomes a connected session.
//!
//! ## Handshake
//! ```text
//! peer                                    server
//!  | OPEN_CONNECTION_REQUEST_1 (MTU probe) ->|  session created, INITIALIZING
//!  |<- OPEN_CONNECTION_REPLY_1               |
//!  | OPEN_CONNECTION_REQUEST_2 (MTU, GUID) ->|  INITIALIZED
//!  |<- OPEN_CONNECTION_REPLY_2               |
//!  | CONNECTION_REQUEST (GUID, time)       ->|  CONNECTING
//!  |<- CONNECTION_REQUEST_ACCEPTED           |  (or CONNECTION_REQUEST_FAILED + close)
//!  | NEW_INCOMING_CONNECTION               ->|  CONNECTED
//! ```
//!
//! ## Modules
//! - [`core`]: fixed-layout wire codec and packet layouts
//! - [`protocol`]: the per-session state machine and dispatcher
//! - [`server`]: process-wide context and datagram entry point
//! - [`transport`]: outbound send trait and the address-keyed session registry
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! Reliability (acks, ordering, fragmentation), encryption and the socket itself are
//! provided by the host through [`transport::SessionTransport`].

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
pub use protocol::{DisconnectReason, ServerSession, Session, SessionState};
pub use server::Server;
