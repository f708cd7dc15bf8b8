//! Events dispatched by a single session, and the close codes they carry.

use super::dispatcher::Event;
use crate::error::SessionError;

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Protocol error; also used to deny a connection at admission.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
/// No status code was present. Default code for application-initiated
/// closes; sent as a close frame without a body.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// The connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close reason sent to peers rejected by a `connection` handler.
pub const ACCESS_DENIED_REASON: &str = "Access Denied";

/// Event emitted by a [`crate::ws::Session`].
///
/// Within one session events are dispatched strictly in transport order and
/// never concurrently. `Open` is first, `Close` is last and fires at most
/// once.
#[derive(Debug)]
pub enum SessionEvent {
    /// The read loop started.
    Open,
    /// A text message arrived.
    Message(String),
    /// A binary message arrived.
    Binary(Vec<u8>),
    /// A ping arrived. The transport answers it.
    Ping(Vec<u8>),
    /// A pong arrived (client sessions only).
    Pong(Vec<u8>),
    /// The transport reported an error, or a client connect failed.
    Error(SessionError),
    /// The session reached its terminal state.
    Close {
        /// Close code from the peer, the local `close()` call, or
        /// [`CLOSE_ABNORMAL`] if the transport vanished.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

/// Subscription key for [`SessionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    /// [`SessionEvent::Open`].
    Open,
    /// [`SessionEvent::Message`].
    Message,
    /// [`SessionEvent::Binary`].
    Binary,
    /// [`SessionEvent::Ping`].
    Ping,
    /// [`SessionEvent::Pong`].
    Pong,
    /// [`SessionEvent::Error`].
    Error,
    /// [`SessionEvent::Close`].
    Close,
}

impl Event for SessionEvent {
    type Kind = SessionEventKind;

    fn kind(&self) -> SessionEventKind {
        match self {
            Self::Open => SessionEventKind::Open,
            Self::Message(_) => SessionEventKind::Message,
            Self::Binary(_) => SessionEventKind::Binary,
            Self::Ping(_) => SessionEventKind::Ping,
            Self::Pong(_) => SessionEventKind::Pong,
            Self::Error(_) => SessionEventKind::Error,
            Self::Close { .. } => SessionEventKind::Close,
        }
    }
}

impl SessionEvent {
    /// Returns `true` for events that carry application traffic
    /// (message, binary, ping, pong).
    #[must_use]
    pub const fn is_traffic(&self) -> bool {
        matches!(
            self,
            Self::Message(_) | Self::Binary(_) | Self::Ping(_) | Self::Pong(_)
        )
    }
}
