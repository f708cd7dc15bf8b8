//! Decoded WebSocket traffic crossing the transport boundary.

/// A decoded event delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text message.
    Text(String),
    /// Binary message.
    Binary(Vec<u8>),
    /// Ping control frame body.
    Ping(Vec<u8>),
    /// Pong control frame body.
    Pong(Vec<u8>),
    /// Close control frame. A frame without a status maps to code 1005.
    Close {
        /// Close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

/// A command handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text message.
    Text(String),
    /// Send a binary message.
    Binary(Vec<u8>),
    /// Start the close handshake. `code: None` sends a close frame without
    /// a status body.
    Close {
        /// Close code, or `None` for "no status".
        code: Option<u16>,
        /// Close reason; dropped when `code` is `None`.
        reason: String,
    },
}

/// Application payload accepted by [`super::Session::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl From<Payload> for Outbound {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Self::Text(text),
            Payload::Binary(bytes) => Self::Binary(bytes),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_conversions() {
        assert_eq!(Payload::from("hi"), Payload::Text("hi".to_string()));
        assert_eq!(Payload::from(vec![1, 2]), Payload::Binary(vec![1, 2]));
        assert_eq!(
            Outbound::from(Payload::from(&[7u8][..])),
            Outbound::Binary(vec![7])
        );
    }
}
