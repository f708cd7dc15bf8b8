//! In-process transport.
//!
//! [`pair`] returns a [`Transport`] for a session plus the [`MemoryPeer`]
//! that drives it: the peer injects decoded inbound events (including
//! errors and end-of-stream) and observes everything the session sends.
//! Useful for tests and for embedding sessions behind a non-socket
//! acceptor.

use futures_util::{sink, stream};
use tokio::sync::mpsc;

use super::frame::{Inbound, Outbound};
use super::transport::Transport;
use crate::error::SessionError;

/// The remote end of an in-memory transport.
#[derive(Debug)]
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Result<Inbound, SessionError>>>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

/// Creates a connected transport / peer pair.
#[must_use]
pub fn pair() -> (Transport, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    let inbound = stream::unfold(in_rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    let outbound = sink::unfold(out_tx, |tx, item: Outbound| async move {
        tx.send(item)
            .map_err(|_| SessionError::transport_fatal("memory peer dropped"))?;
        Ok::<_, SessionError>(tx)
    });

    let peer = MemoryPeer {
        inbound: Some(in_tx),
        outbound: out_rx,
    };
    (Transport::new(inbound, outbound), peer)
}

impl MemoryPeer {
    /// Delivers a decoded event to the session. Returns `false` once the
    /// session side is gone or [`MemoryPeer::end`] was called.
    pub fn push(&self, frame: Inbound) -> bool {
        self.deliver(Ok(frame))
    }

    /// Delivers a receive error to the session.
    pub fn fail(&self, err: SessionError) -> bool {
        self.deliver(Err(err))
    }

    /// Ends the inbound stream.
    pub fn end(&mut self) {
        self.inbound = None;
    }

    /// Waits for the next command sent by the session. Returns `None` once
    /// the session released its transport and everything was drained.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Returns every command already sent by the session.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut sent = Vec::new();
        while let Ok(out) = self.outbound.try_recv() {
            sent.push(out);
        }
        sent
    }

    fn deliver(&self, item: Result<Inbound, SessionError>) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(item).is_ok())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};

    #[tokio::test]
    async fn pushed_frames_reach_the_stream_in_order() {
        let (transport, mut peer) = pair();
        let (mut inbound, _outbound) = transport.into_parts();

        assert!(peer.push(Inbound::Text("a".to_string())));
        assert!(peer.push(Inbound::Binary(vec![1])));
        peer.end();

        let Some(Ok(first)) = inbound.next().await else {
            panic!("expected first frame");
        };
        assert_eq!(first, Inbound::Text("a".to_string()));
        let Some(Ok(second)) = inbound.next().await else {
            panic!("expected second frame");
        };
        assert_eq!(second, Inbound::Binary(vec![1]));
        assert!(inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn push_after_end_is_rejected() {
        let (_transport, mut peer) = pair();
        peer.end();
        assert!(!peer.push(Inbound::Text("late".to_string())));
    }

    #[tokio::test]
    async fn sent_commands_are_observed() {
        let (transport, mut peer) = pair();
        let (_inbound, mut outbound) = transport.into_parts();

        tokio_test::assert_ok!(outbound.send(Outbound::Text("hi".to_string())).await);
        assert_eq!(peer.recv().await, Some(Outbound::Text("hi".to_string())));

        drop(outbound);
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn send_after_peer_dropped_is_fatal() {
        let (transport, peer) = pair();
        let (_inbound, mut outbound) = transport.into_parts();
        drop(peer);

        let Err(err) = outbound.send(Outbound::Binary(vec![0])).await else {
            panic!("expected send failure");
        };
        assert!(err.is_fatal());
    }
}
