//! Connection identity and lifecycle states.
//!
//! ```text
//! Accepted ──▶ DirectResponse ──┐
//!     │                         ├──▶ Closed
//!     └─────▶ RouteAndForward ──┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, nothing read yet.
    Accepted,
    /// Answering locally, no router involved.
    DirectResponse,
    /// Relaying between the client and a routed backend.
    RouteAndForward,
    /// Both sides released.
    Closed,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Accepted, DirectResponse)
                | (Accepted, RouteAndForward)
                | (Accepted, Closed)
                | (DirectResponse, Closed)
                | (RouteAndForward, Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::DirectResponse => "direct_response",
            ConnectionState::RouteAndForward => "route_and_forward",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
