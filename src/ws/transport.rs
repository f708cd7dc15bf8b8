//! Transport adapters.
//!
//! A [`Transport`] is the already-handshaken, already-decoded side of one
//! WebSocket connection: a stream of [`Inbound`] events and a sink of
//! [`Outbound`] commands. Framing, masking and control-frame replies stay in
//! the library that produced the socket (axum on the server side,
//! tokio-tungstenite on the client side).

use std::fmt;
use std::pin::Pin;

use axum::extract::ws as axum_ws;
use futures_util::future;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::frame::{Inbound, Outbound};
use crate::domain::CLOSE_NO_STATUS;
use crate::error::SessionError;

/// Receive half of a transport.
pub type InboundStream = BoxStream<'static, Result<Inbound, SessionError>>;

/// Send half of a transport.
pub type OutboundSink = Pin<Box<dyn Sink<Outbound, Error = SessionError> + Send>>;

/// One decoded, bidirectional WebSocket connection.
pub struct Transport {
    inbound: InboundStream,
    outbound: OutboundSink,
}

impl Transport {
    /// Builds a transport from any stream/sink pair.
    pub fn new<St, Si>(inbound: St, outbound: Si) -> Self
    where
        St: Stream<Item = Result<Inbound, SessionError>> + Send + 'static,
        Si: Sink<Outbound, Error = SessionError> + Send + 'static,
    {
        Self {
            inbound: inbound.boxed(),
            outbound: Box::pin(outbound),
        }
    }

    /// Wraps a socket upgraded by axum.
    #[must_use]
    pub fn from_axum(socket: axum_ws::WebSocket) -> Self {
        let (tx, rx) = socket.split();
        let inbound = rx.filter_map(|item| {
            future::ready(match item {
                Ok(message) => from_axum_message(message).map(Ok),
                Err(err) => Some(Err(SessionError::from(err))),
            })
        });
        let outbound = tx.with(|out: Outbound| {
            future::ready(Ok::<_, SessionError>(to_axum_message(out)))
        });
        Self::new(inbound, outbound)
    }

    /// Wraps a tokio-tungstenite stream (client connections, or servers
    /// that perform their own handshake).
    #[must_use]
    pub fn from_tungstenite<S>(stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = stream.split();
        let inbound = rx.filter_map(|item| {
            future::ready(match item {
                Ok(message) => from_tungstenite_message(message).map(Ok),
                Err(err) => Some(Err(SessionError::from(err))),
            })
        });
        let outbound = tx.with(|out: Outbound| {
            future::ready(Ok::<_, SessionError>(to_tungstenite_message(out)))
        });
        Self::new(inbound, outbound)
    }

    /// Splits the transport into its receive and send halves.
    pub(crate) fn into_parts(self) -> (InboundStream, OutboundSink) {
        (self.inbound, self.outbound)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

#[allow(unreachable_patterns)]
fn from_axum_message(message: axum_ws::Message) -> Option<Inbound> {
    match message {
        axum_ws::Message::Text(text) => Some(Inbound::Text(text.as_str().to_owned())),
        axum_ws::Message::Binary(bytes) => Some(Inbound::Binary(bytes.to_vec())),
        axum_ws::Message::Ping(body) => Some(Inbound::Ping(body.to_vec())),
        axum_ws::Message::Pong(body) => Some(Inbound::Pong(body.to_vec())),
        axum_ws::Message::Close(Some(frame)) => Some(Inbound::Close {
            code: frame.code,
            reason: frame.reason.as_str().to_owned(),
        }),
        axum_ws::Message::Close(None) => Some(no_status_close()),
        _ => None,
    }
}

fn to_axum_message(out: Outbound) -> axum_ws::Message {
    match out {
        Outbound::Text(text) => axum_ws::Message::Text(text.into()),
        Outbound::Binary(bytes) => axum_ws::Message::Binary(bytes.into()),
        Outbound::Close { code: None, .. } => axum_ws::Message::Close(None),
        Outbound::Close {
            code: Some(code),
            reason,
        } => axum_ws::Message::Close(Some(axum_ws::CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}

fn from_tungstenite_message(message: tungstenite::Message) -> Option<Inbound> {
    match message {
        tungstenite::Message::Text(text) => Some(Inbound::Text(text.as_str().to_owned())),
        tungstenite::Message::Binary(bytes) => Some(Inbound::Binary(bytes.to_vec())),
        tungstenite::Message::Ping(body) => Some(Inbound::Ping(body.to_vec())),
        tungstenite::Message::Pong(body) => Some(Inbound::Pong(body.to_vec())),
        tungstenite::Message::Close(Some(frame)) => Some(Inbound::Close {
            code: u16::from(frame.code),
            reason: frame.reason.as_str().to_owned(),
        }),
        tungstenite::Message::Close(None) => Some(no_status_close()),
        // Raw frames are only produced when writing.
        tungstenite::Message::Frame(_) => None,
    }
}

fn to_tungstenite_message(out: Outbound) -> tungstenite::Message {
    match out {
        Outbound::Text(text) => tungstenite::Message::Text(text.into()),
        Outbound::Binary(bytes) => tungstenite::Message::Binary(bytes.into()),
        Outbound::Close { code: None, .. } => tungstenite::Message::Close(None),
        Outbound::Close {
            code: Some(code),
            reason,
        } => tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        })),
    }
}

fn no_status_close() -> Inbound {
    Inbound::Close {
        code: CLOSE_NO_STATUS,
        reason: String::new(),
    }
}
