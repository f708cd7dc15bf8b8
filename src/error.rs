//! Session and server error types.
//!
//! [`SessionError`] is the single error type of the crate. Errors are local
//! to the session or connection that produced them: they are reported
//! through the `error` event of a [`crate::ws::Session`] or
//! [`crate::service::WsServer`] and never tear down unrelated sessions.

use crate::domain::SessionState;

/// Errors produced by sessions, transports, and the server acceptor.
///
/// # Taxonomy
///
/// | Variant          | Reported via            | Effect                          |
/// |------------------|-------------------------|---------------------------------|
/// | `Connect`        | session `error` event   | session never opens             |
/// | `Accept`         | server `error` event    | no session is created           |
/// | `Transport`      | session `error` event   | best-effort close, loop goes on |
/// | `NoTransport`    | `send` return value     | nothing was sent                |
/// | `NotOpen`        | `send` return value     | nothing was sent                |
/// | `Bind`           | `listen` return value   | server is not listening         |
/// | `InvalidAddress` | `listen` return value   | server is not listening         |
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Client mode could not establish the transport.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Server mode failed to upgrade one incoming connection.
    #[error("upgrade failed: {0}")]
    Accept(String),

    /// Mid-session transport fault.
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable description from the underlying transport.
        message: String,
        /// Whether the transport is unusable after this error.
        fatal: bool,
    },

    /// The session has no live transport attached.
    #[error("session has no transport")]
    NoTransport,

    /// The session is not in the `Open` state.
    #[error("session is not open (state: {0})")]
    NotOpen(SessionState),

    /// Binding the listener failed.
    #[error("bind failed: {0}")]
    Bind(#[from] std::io::Error),

    /// The `host:port` pair could not be resolved to a socket address.
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),
}

impl SessionError {
    /// Builds a recoverable transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            fatal: false,
        }
    }

    /// Builds a transport error after which the transport is unusable.
    #[must_use]
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            fatal: true,
        }
    }

    /// Returns `true` if the read loop cannot continue after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Transport { fatal, .. } => *fatal,
            Self::NoTransport | Self::Connect(_) => true,
            Self::Accept(_) | Self::NotOpen(_) | Self::Bind(_) | Self::InvalidAddress(_) => false,
        }
    }
}

impl From<axum::Error> for SessionError {
    fn from(err: axum::Error) -> Self {
        // axum hides the tungstenite error behind a boxed source; the read
        // loop relies on end-of-stream to detect a dead socket.
        Self::transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Io(_) => {
                Self::transport_fatal(err.to_string())
            }
            other => Self::transport(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::Error as WsError;

    #[test]
    fn recoverable_transport_error_is_not_fatal() {
        assert!(!SessionError::transport("bad utf-8").is_fatal());
    }

    #[test]
    fn fatal_transport_error_is_fatal() {
        assert!(SessionError::transport_fatal("reset").is_fatal());
    }

    #[test]
    fn closed_tungstenite_connection_is_fatal() {
        assert!(SessionError::from(WsError::ConnectionClosed).is_fatal());
        assert!(SessionError::from(WsError::AlreadyClosed).is_fatal());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(SessionError::from(WsError::Io(io)).is_fatal());
    }

    #[test]
    fn not_open_mentions_state() {
        let err = SessionError::NotOpen(SessionState::Closed);
        assert_eq!(err.to_string(), "session is not open (state: closed)");
    }

    #[test]
    fn accept_error_does_not_stop_anything() {
        assert!(!SessionError::Accept("missing key".to_string()).is_fatal());
    }
}
