//! Connection lifecycle states.

use std::fmt;

/// Lifecycle of a client connection. States only ever move forward:
/// `NotConnected` → `Open` → `Closing` → `Closed`, possibly skipping some.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConnectionState {
    /// Handshake not yet completed.
    #[default]
    NotConnected,
    /// Upgrade accepted; frames flow both ways.
    Open,
    /// Shutdown requested, waiting for the reader to stop.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Move to `next` if that is a forward step.
    ///
    /// Returns `false` and leaves the state unchanged otherwise.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }

    /// Only an open connection accepts outbound frames.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    #[must_use]
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::NotConnected => "NOT_CONNECTED",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Closed => "CLOSED",
        })
    }
}
