//! # Handshake Protocol
//!
//! The per-peer state machine that turns an unauthenticated address into a
//! connected session.
//!
//! ## Components
//! - **State**: `SessionState` and its legal transitions
//! - **Session**: shared session state, the `Session` capability trait and `ServerSession`
//! - **Dispatcher**: routes a datagram to a handler by its leading id byte
//! - **Handshake**: the handlers and the replies they encode

pub mod dispatcher;
pub mod handshake;
pub mod session;
pub mod state;

#[cfg(test)]
mod tests;

pub use session::{DisconnectReason, ServerSession, Session, SessionCore};
pub use state::SessionState;
