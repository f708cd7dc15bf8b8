//! WebSocket session state machine.
//!
//! A [`Session`] owns one [`Transport`] and turns its inbound stream into
//! ordered [`SessionEvent`]s. The read loop ([`Session::run`]) is the only
//! place traffic events are dispatched from, so events of one session never
//! run concurrently. The terminal `close` event fires exactly once: from the
//! loop when it is running, or from [`Session::close`] when it never started
//! (a connection denied at admission).

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::frame::{Inbound, Outbound, Payload};
use super::transport::{InboundStream, OutboundSink, Transport};
use crate::domain::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, ClientSummary, EventDispatcher, SessionEvent,
    SessionEventKind, SessionId, SessionRole, SessionState,
};
use crate::error::SessionError;

/// What is known about the remote end when a session is created.
#[derive(Debug, Clone, Default)]
pub struct PeerInfo {
    /// Remote URL (client mode) or socket address (server mode).
    pub remote: Option<String>,
    /// Headers of the upgrade request. Empty for client sessions.
    pub headers: HeaderMap,
}

impl PeerInfo {
    /// Creates peer info for the given remote address.
    #[must_use]
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: Some(remote.into()),
            headers: HeaderMap::new(),
        }
    }

    /// Attaches upgrade request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Mutable lifecycle bookkeeping, guarded by one lock so that `run` and
/// `close` agree on who dispatches the terminal event.
#[derive(Default)]
struct Lifecycle {
    state: SessionState,
    inbound: Option<InboundStream>,
    running: bool,
    connecting: bool,
    close_dispatched: bool,
    requested_close: Option<(u16, String)>,
}

struct Inner {
    id: SessionId,
    role: SessionRole,
    peer: PeerInfo,
    connected_at: DateTime<Utc>,
    lifecycle: Mutex<Lifecycle>,
    outbound: tokio::sync::Mutex<Option<OutboundSink>>,
    cancel: CancellationToken,
    events: EventDispatcher<SessionEvent>,
}

/// Handle to one WebSocket session.
///
/// Cloning is cheap and every clone refers to the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    fn build(role: SessionRole, peer: PeerInfo, transport: Option<Transport>) -> Self {
        let (inbound, outbound) = match transport.map(Transport::into_parts) {
            Some((inbound, outbound)) => (Some(inbound), Some(outbound)),
            None => (None, None),
        };
        Self {
            inner: Arc::new(Inner {
                id: SessionId::new(),
                role,
                peer,
                connected_at: Utc::now(),
                lifecycle: Mutex::new(Lifecycle {
                    inbound,
                    ..Lifecycle::default()
                }),
                outbound: tokio::sync::Mutex::new(outbound),
                cancel: CancellationToken::new(),
                events: EventDispatcher::new(),
            }),
        }
    }

    /// Wraps an already-handshaken transport. The read loop is not started;
    /// call [`Session::run`] once handlers are registered.
    #[must_use]
    pub fn from_transport(role: SessionRole, transport: Transport, peer: PeerInfo) -> Self {
        Self::build(role, peer, Some(transport))
    }

    /// Creates a client session for `url` without connecting yet.
    ///
    /// Register handlers, then call [`Session::connect`].
    #[must_use]
    pub fn client(url: impl Into<String>) -> Self {
        Self::build(SessionRole::Client, PeerInfo::new(url), None)
    }

    /// Connects a client session and runs its read loop on a new task.
    ///
    /// A failed connect dispatches [`SessionEvent::Error`] with
    /// [`SessionError::Connect`] and leaves the session `Closed` without
    /// ever firing `open` or `close`. Calling this more than once, or on a
    /// server session, does nothing.
    pub fn connect(&self) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move { session.connect_and_run().await })
    }

    async fn connect_and_run(&self) {
        let Some(url) = self.claim_connect() else {
            tracing::debug!(session_id = %self.id(), "connect skipped");
            return;
        };

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                tracing::debug!(session_id = %self.id(), %url, "connected");
                if self.attach(Transport::from_tungstenite(stream)).await {
                    self.run().await;
                }
            }
            Err(err) => {
                tracing::warn!(session_id = %self.id(), %url, error = %err, "connect failed");
                self.emit(SessionEvent::Error(SessionError::Connect(err.to_string())));
                {
                    let mut lifecycle = self.inner.lifecycle.lock();
                    lifecycle.state = SessionState::Closed;
                    lifecycle.close_dispatched = true;
                }
                self.inner.events.clear();
            }
        }
    }

    fn claim_connect(&self) -> Option<String> {
        if self.inner.role != SessionRole::Client {
            return None;
        }
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.connecting
            || lifecycle.inbound.is_some()
            || lifecycle.state != SessionState::Connecting
        {
            return None;
        }
        lifecycle.connecting = true;
        self.inner.peer.remote.clone()
    }

    async fn attach(&self, transport: Transport) -> bool {
        let (inbound, outbound) = transport.into_parts();
        let mut slot = self.inner.outbound.lock().await;
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state != SessionState::Connecting {
            // Closed while the connect was in flight; dropping the
            // transport tears the socket down.
            return false;
        }
        lifecycle.inbound = Some(inbound);
        *slot = Some(outbound);
        true
    }

    /// Returns the session identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Returns whether this is a client or server session.
    #[must_use]
    pub fn role(&self) -> SessionRole {
        self.inner.role
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.lifecycle.lock().state
    }

    /// Returns `true` while the session is `Open`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Remote URL (client) or peer socket address (server).
    #[must_use]
    pub fn remote(&self) -> Option<&str> {
        self.inner.peer.remote.as_deref()
    }

    /// Headers of the upgrade request (empty for client sessions).
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.peer.headers
    }

    /// When the session object was created.
    #[must_use]
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.inner.connected_at
    }

    /// Returns a serialisable snapshot of this session.
    #[must_use]
    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            id: self.id(),
            role: self.role(),
            state: self.state(),
            remote: self.inner.peer.remote.clone(),
            connected_at: self.inner.connected_at,
        }
    }

    /// Subscribes a raw handler to every event of `kind`.
    pub fn on<F>(&self, kind: SessionEventKind, handler: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, handler);
    }

    /// Subscribes to the start of the read loop.
    pub fn on_open<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(SessionEventKind::Open, move |_| handler());
    }

    /// Subscribes to text messages.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(SessionEventKind::Message, move |event| {
            if let SessionEvent::Message(text) = event {
                handler(text);
            }
        });
    }

    /// Subscribes to binary messages.
    pub fn on_binary<F>(&self, handler: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.on(SessionEventKind::Binary, move |event| {
            if let SessionEvent::Binary(bytes) = event {
                handler(bytes);
            }
        });
    }

    /// Subscribes to ping bodies.
    pub fn on_ping<F>(&self, handler: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.on(SessionEventKind::Ping, move |event| {
            if let SessionEvent::Ping(body) = event {
                handler(body);
            }
        });
    }

    /// Subscribes to pong bodies. Only client sessions dispatch pongs.
    pub fn on_pong<F>(&self, handler: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.on(SessionEventKind::Pong, move |event| {
            if let SessionEvent::Pong(body) = event {
                handler(body);
            }
        });
    }

    /// Subscribes to transport and connect errors.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&SessionError) + Send + Sync + 'static,
    {
        self.on(SessionEventKind::Error, move |event| {
            if let SessionEvent::Error(err) = event {
                handler(err);
            }
        });
    }

    /// Subscribes to the terminal close event with `(code, reason)`.
    pub fn on_close<F>(&self, handler: F)
    where
        F: Fn(u16, &str) + Send + Sync + 'static,
    {
        self.on(SessionEventKind::Close, move |event| {
            if let SessionEvent::Close { code, reason } = event {
                handler(*code, reason);
            }
        });
    }

    /// Sends a text or binary payload.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoTransport`] if no transport is attached,
    /// [`SessionError::NotOpen`] if the session is not `Open`, or the
    /// transport's own error if the write fails.
    pub async fn send(&self, payload: impl Into<Payload>) -> Result<(), SessionError> {
        let mut slot = self.inner.outbound.lock().await;
        let Some(sink) = slot.as_mut() else {
            return Err(SessionError::NoTransport);
        };
        let state = self.state();
        if state != SessionState::Open {
            return Err(SessionError::NotOpen(state));
        }
        sink.send(Outbound::from(payload.into())).await
    }

    /// Sends a text message.
    ///
    /// # Errors
    ///
    /// See [`Session::send`].
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(Payload::Text(text.into())).await
    }

    /// Sends a binary message.
    ///
    /// # Errors
    ///
    /// See [`Session::send`].
    pub async fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> Result<(), SessionError> {
        self.send(Payload::Binary(bytes.into())).await
    }

    /// Closes with [`CLOSE_NO_STATUS`] and an empty reason.
    pub async fn close_default(&self) {
        self.close(CLOSE_NO_STATUS, "").await;
    }

    /// Requests shutdown with `code` and `reason`.
    ///
    /// Idempotent: a session already closing or closed is left alone, except
    /// that a loop closing after a receive error is still cancelled with the
    /// given code. At most one close frame is sent per session.
    /// Transport failures are logged, never returned. If the read loop is
    /// running it is cancelled and dispatches `close(code, reason)`;
    /// otherwise the close event is dispatched before this returns.
    pub async fn close(&self, code: u16, reason: impl Into<String>) {
        let reason = reason.into();
        let (running, frame_sent) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                SessionState::Closed => return,
                // The loop already sent a close frame after a receive error;
                // only the local code and reason are still missing.
                SessionState::Closing
                    if lifecycle.running && lifecycle.requested_close.is_none() =>
                {
                    lifecycle.requested_close = Some((code, reason.clone()));
                    (true, true)
                }
                SessionState::Closing => return,
                SessionState::Connecting | SessionState::Open => {
                    lifecycle.state = SessionState::Closing;
                    lifecycle.requested_close = Some((code, reason.clone()));
                    (lifecycle.running, false)
                }
            }
        };
        tracing::debug!(session_id = %self.id(), code, reason = %reason, "closing session");

        if !frame_sent {
            let status = (code != CLOSE_NO_STATUS).then_some(code);
            self.send_close_frame(status, reason.clone()).await;
        }

        if running {
            self.inner.cancel.cancel();
        } else {
            self.finish(code, reason);
            self.release_transport().await;
        }
    }

    /// Runs the read-dispatch loop until the session closes.
    ///
    /// Moves `Connecting → Open`, fires `open`, then dispatches every
    /// transport event in order. Only the first call on a session with a
    /// transport does anything.
    pub async fn run(&self) {
        let inbound = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state != SessionState::Connecting {
                return;
            }
            let Some(inbound) = lifecycle.inbound.take() else {
                return;
            };
            lifecycle.state = SessionState::Open;
            lifecycle.running = true;
            inbound
        };

        tracing::debug!(session_id = %self.id(), role = ?self.role(), "session open");
        self.emit(SessionEvent::Open);

        let (code, reason) = self.read_loop(inbound).await;
        self.finish(code, reason);
        self.release_transport().await;
    }

    async fn read_loop(&self, mut inbound: InboundStream) -> (u16, String) {
        loop {
            let next = tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => return self.requested_close(),
                next = inbound.next() => next,
            };

            match next {
                None => {
                    tracing::debug!(session_id = %self.id(), "transport ended without close frame");
                    return (CLOSE_ABNORMAL, String::new());
                }
                Some(Ok(frame)) => {
                    if let ControlFlow::Break(terminal) = self.dispatch_frame(frame) {
                        return terminal;
                    }
                }
                Some(Err(err)) => {
                    let fatal = err.is_fatal();
                    tracing::warn!(session_id = %self.id(), error = %err, fatal, "receive error");
                    self.emit(SessionEvent::Error(err));
                    if self.begin_closing() {
                        self.send_close_frame(Some(CLOSE_NORMAL), String::new())
                            .await;
                    }
                    if fatal {
                        return (CLOSE_ABNORMAL, String::new());
                    }
                }
            }
        }
    }

    fn dispatch_frame(&self, frame: Inbound) -> ControlFlow<(u16, String)> {
        let event = match frame {
            Inbound::Close { code, reason } => return ControlFlow::Break((code, reason)),
            Inbound::Text(text) => SessionEvent::Message(text),
            Inbound::Binary(bytes) => SessionEvent::Binary(bytes),
            Inbound::Ping(body) => SessionEvent::Ping(body),
            Inbound::Pong(body) if self.inner.role == SessionRole::Client => {
                SessionEvent::Pong(body)
            }
            Inbound::Pong(_) => {
                tracing::trace!(session_id = %self.id(), "pong ignored on server session");
                return ControlFlow::Continue(());
            }
        };
        self.emit(event);
        ControlFlow::Continue(())
    }

    fn emit(&self, event: SessionEvent) {
        if event.is_traffic() && self.state() == SessionState::Closed {
            tracing::trace!(session_id = %self.id(), "dropping event after close");
            return;
        }
        let _ = self.inner.events.dispatch(&event);
    }

    /// Moves `Open → Closing` after a receive error. Returns `false` if the
    /// close handshake had already started.
    fn begin_closing(&self) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state != SessionState::Open {
            return false;
        }
        lifecycle.state = SessionState::Closing;
        true
    }

    fn requested_close(&self) -> (u16, String) {
        self.inner
            .lifecycle
            .lock()
            .requested_close
            .take()
            .unwrap_or((CLOSE_NO_STATUS, String::new()))
    }

    /// Moves to `Closed` and dispatches the close event, once.
    fn finish(&self, code: u16, reason: String) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.close_dispatched {
                return;
            }
            lifecycle.close_dispatched = true;
            lifecycle.state = SessionState::Closed;
            lifecycle.running = false;
            lifecycle.inbound = None;
        }
        tracing::info!(session_id = %self.id(), code, reason = %reason, "session closed");
        let _ = self.inner.events.dispatch(&SessionEvent::Close { code, reason });
        // Handlers commonly capture a clone of the session; dropping them
        // here breaks that cycle.
        self.inner.events.clear();
    }

    async fn send_close_frame(&self, code: Option<u16>, reason: String) {
        let mut slot = self.inner.outbound.lock().await;
        let Some(sink) = slot.as_mut() else {
            tracing::debug!(session_id = %self.id(), "close requested without transport");
            return;
        };
        if let Err(err) = sink.send(Outbound::Close { code, reason }).await {
            tracing::warn!(session_id = %self.id(), error = %err, "transport close failed");
        }
    }

    async fn release_transport(&self) {
        let _ = self.inner.outbound.lock().await.take();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("role", &self.inner.role)
            .field("state", &self.state())
            .field("remote", &self.inner.peer.remote)
            .finish_non_exhaustive()
    }
}
