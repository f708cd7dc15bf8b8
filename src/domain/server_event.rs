//! Server-level events and the admission decision.

use std::net::SocketAddr;

use super::dispatcher::Event;
use crate::error::SessionError;
use crate::ws::Session;

/// Outcome of a `connection` handler.
///
/// Handlers may return an `Admission`, a `bool`, or nothing at all; `()` is
/// treated as [`Admission::Allow`] so that a handler only needs to speak up
/// when it rejects a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Admission {
    /// Start the session's read loop.
    #[default]
    Allow,
    /// Close the session with `1002 Access Denied` without reading from it.
    Deny,
}

impl Admission {
    /// Folds the decisions of several handlers: any `Deny` wins.
    #[must_use]
    pub fn combine(decisions: impl IntoIterator<Item = Self>) -> Self {
        if decisions.into_iter().any(|d| d == Self::Deny) {
            Self::Deny
        } else {
            Self::Allow
        }
    }
}

impl From<()> for Admission {
    fn from((): ()) -> Self {
        Self::Allow
    }
}

impl From<bool> for Admission {
    fn from(allow: bool) -> Self {
        if allow { Self::Allow } else { Self::Deny }
    }
}

/// Event emitted by a [`crate::service::WsServer`].
#[derive(Debug)]
pub enum ServerEvent {
    /// A connection was upgraded and registered; handlers decide admission.
    Connection(Session),
    /// An incoming connection failed to upgrade.
    Error(SessionError),
    /// The listener is bound.
    Listening(SocketAddr),
    /// The server stopped admitting connections.
    Close,
}

/// Subscription key for [`ServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEventKind {
    /// [`ServerEvent::Connection`].
    Connection,
    /// [`ServerEvent::Error`].
    Error,
    /// [`ServerEvent::Listening`].
    Listening,
    /// [`ServerEvent::Close`].
    Close,
}

impl Event for ServerEvent {
    type Kind = ServerEventKind;

    fn kind(&self) -> ServerEventKind {
        match self {
            Self::Connection(_) => ServerEventKind::Connection,
            Self::Error(_) => ServerEventKind::Error,
            Self::Listening(_) => ServerEventKind::Listening,
            Self::Close => ServerEventKind::Close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_and_true_allow() {
        assert_eq!(Admission::from(()), Admission::Allow);
        assert_eq!(Admission::from(true), Admission::Allow);
        assert_eq!(Admission::default(), Admission::Allow);
    }

    #[test]
    fn false_denies() {
        assert_eq!(Admission::from(false), Admission::Deny);
    }

    #[test]
    fn combine_any_deny_wins() {
        assert_eq!(Admission::combine(std::iter::empty()), Admission::Allow);
        assert_eq!(
            Admission::combine([Admission::Allow, Admission::Allow]),
            Admission::Allow
        );
        assert_eq!(
            Admission::combine([Admission::Allow, Admission::Deny, Admission::Allow]),
            Admission::Deny
        );
    }
}
