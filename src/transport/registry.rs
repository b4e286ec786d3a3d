//! # Session Registry
//!
//! Address-keyed map of live sessions shared by every handler.
//!
//! ## Features
//! - **Thread-safe**: every operation is atomic with respect to the others
//! - **Insert if absent**: a retransmitted first packet never replaces a live session
//! - **Compare and remove**: a session only ever removes the entry that points at itself,
//!   so a stale session closing late cannot evict its replacement
//!
//! ## Usage
//! ```rust
//! use raknet_handshake::transport::SessionRegistry;
//! use std::sync::Arc;
//!
//! let registry: SessionRegistry<String> = SessionRegistry::new();
//! let addr = "127.0.0.1:19132".parse().unwrap();
//!
//! let (session, created) = registry.insert_if_absent(addr, || Arc::new("peer".to_string()));
//! assert!(created);
//! assert!(registry.remove_if_same(&addr, &session));
//! assert!(registry.is_empty());
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, trace};

use crate::error::constants;

pub struct SessionRegistry<S> {
    sessions: RwLock<HashMap<SocketAddr, Arc<S>>>,
}

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SessionRegistry<S> {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the session registered for `addr`
    pub fn get(&self, addr: &SocketAddr) -> Option<Arc<S>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(addr)
            .cloned()
    }

    /// Return the session for `addr`, creating it with `make` if none is registered.
    ///
    /// The flag is `true` when this call created the session.
    pub fn insert_if_absent<F>(&self, addr: SocketAddr, make: F) -> (Arc<S>, bool)
    where
        F: FnOnce() -> Arc<S>,
    {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = sessions.get(&addr) {
            return (existing.clone(), false);
        }

        let session = make();
        sessions.insert(addr, session.clone());
        trace!(%addr, session_count = sessions.len(), "Session registered");
        (session, true)
    }

    /// Remove the entry for `addr` only if it currently maps to `session` itself.
    ///
    /// Identity is pointer identity, so `session` may be the `&S` a session holds of
    /// itself.
    pub fn remove_if_same(&self, addr: &SocketAddr, session: &S) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let same = sessions
            .get(addr)
            .is_some_and(|existing| std::ptr::eq(Arc::as_ptr(existing), session));

        if same {
            sessions.remove(addr);
            trace!(%addr, session_count = sessions.len(), "Session deregistered");
        }
        same
    }

    /// Deregister `session` from `addr`.
    ///
    /// # Panics
    /// If `addr` is not currently mapped to `session`. That can only happen through a
    /// bookkeeping bug in session lifecycle management (a double close, or a session
    /// replaced without handoff), never through anything a peer sends.
    pub fn deregister(&self, addr: &SocketAddr, session: &S) {
        if !self.remove_if_same(addr, session) {
            error!(%addr, "{}", constants::ERR_REGISTRY_INCONSISTENT);
            panic!("{} ({addr})", constants::ERR_REGISTRY_INCONSISTENT);
        }
    }

    /// Snapshot of every registered session.
    ///
    /// The lock is released before returning, so callers may close sessions (which
    /// deregisters them) while iterating the snapshot.
    pub fn sessions(&self) -> Vec<Arc<S>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
