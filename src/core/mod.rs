//! # Core Wire Components
//!
//! Fixed-layout binary encoding for the RakNet connection handshake.
//!
//! ## Components
//! - **Codec**: magic marker, booleans and IPv4/IPv6 socket addresses
//! - **Packet**: packet identifiers plus request decoders and reply encoders
//!
//! ## Wire Format
//! ```text
//! [Id(1)] [Body(N)]
//! ```
//!
//! Every layout is size-stable per address family: field offsets never depend on
//! anything except whether the peer is IPv4 or IPv6.

pub mod codec;
pub mod packet;
