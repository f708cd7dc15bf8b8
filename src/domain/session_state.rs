//! Session lifecycle states and roles.

use std::fmt;

use serde::Serialize;

/// Lifecycle state of a [`crate::ws::Session`].
///
/// Transitions only move forward:
///
/// ```text
/// Connecting ──► Open ──► Closing ──► Closed
///      │                     ▲          ▲
///      └─────────────────────┴──────────┘
/// ```
///
/// A session skips `Open` when it is denied at admission or when a client
/// connect attempt fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, read loop not started yet.
    #[default]
    Connecting,
    /// Read loop running; traffic is dispatched.
    Open,
    /// A local close was requested and is in flight.
    Closing,
    /// Terminal. No further events are dispatched.
    Closed,
}

impl SessionState {
    /// Returns `true` for `Closing` and `Closed`.
    #[must_use]
    pub const fn is_shutting_down(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Which side of the connection a session represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Session opened by connecting to a remote endpoint.
    Client,
    /// Session wrapping a connection accepted by [`crate::service::WsServer`].
    Server,
}
