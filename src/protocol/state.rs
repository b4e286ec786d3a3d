use std::fmt;

/// Handshake progress of a single session.
///
/// States only move forward in declaration order, except that `Closed` is reachable
/// from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    Initializing,
    Initialized,
    Connecting,
    Connected,
    Closed,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Initializing, Initialized)
                | (Initialized, Connecting)
                | (Connecting, Connected)
                | (Initializing | Initialized | Connecting | Connected, Closed)
        )
    }

    #[inline]
    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Initializing => "INITIALIZING",
            SessionState::Initialized => "INITIALIZED",
            SessionState::Connecting => "CONNECTING",
            SessionState::Connected => "CONNECTED",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}
