//! WebSocket server: admission and the live connection registry.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::routing::get;
use futures_util::{Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::domain::{
    ACCESS_DENIED_REASON, Admission, CLOSE_PROTOCOL_ERROR, ClientRegistry, EventDispatcher,
    ServerEvent, ServerEventKind, SessionRole,
};
use crate::error::SessionError;
use crate::ws::handler::ws_handler;
use crate::ws::{PeerInfo, Session, Transport};

struct ServerInner {
    config: ServerConfig,
    clients: Arc<ClientRegistry>,
    events: EventDispatcher<ServerEvent, Admission>,
    closing: AtomicBool,
    shutdown: CancellationToken,
}

/// Accepts upgraded connections, applies the admission decision, and keeps
/// the id → [`Session`] registry.
///
/// Every accept follows the same order: register the session → install the
/// cleanup close hook → fire `connection` → start the read loop or deny.
/// The cleanup hook is the session's first close handler, so a consumer
/// that observes `close` never finds the session still in
/// [`WsServer::clients`].
///
/// Cloning is cheap and every clone refers to the same server.
#[derive(Clone)]
pub struct WsServer {
    inner: Arc<ServerInner>,
}

impl WsServer {
    /// Creates a server. Nothing is bound until [`WsServer::listen`].
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                clients: Arc::new(ClientRegistry::new()),
                events: EventDispatcher::new(),
                closing: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Returns the registry of live sessions.
    #[must_use]
    pub fn clients(&self) -> &ClientRegistry {
        &self.inner.clients
    }

    /// Returns `true` once [`WsServer::close`] was called.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Subscribes an admission handler.
    ///
    /// The handler runs synchronously after the session is registered and
    /// before its read loop starts. Returning `false` or [`Admission::Deny`]
    /// rejects the peer; `true`, [`Admission::Allow`] or `()` admits it. When
    /// several handlers are registered, any denial wins.
    pub fn on_connection<F, R>(&self, handler: F)
    where
        F: Fn(&Session) -> R + Send + Sync + 'static,
        R: Into<Admission>,
    {
        self.inner
            .events
            .subscribe(ServerEventKind::Connection, move |event| match event {
                ServerEvent::Connection(session) => handler(session).into(),
                _ => Admission::Allow,
            });
    }

    /// Subscribes to upgrade failures.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&SessionError) + Send + Sync + 'static,
    {
        self.inner
            .events
            .subscribe(ServerEventKind::Error, move |event| {
                if let ServerEvent::Error(err) = event {
                    handler(err);
                }
                Admission::Allow
            });
    }

    /// Subscribes to the listener being bound.
    pub fn on_listening<F>(&self, handler: F)
    where
        F: Fn(SocketAddr) + Send + Sync + 'static,
    {
        self.inner
            .events
            .subscribe(ServerEventKind::Listening, move |event| {
                if let ServerEvent::Listening(addr) = event {
                    handler(*addr);
                }
                Admission::Allow
            });
    }

    /// Subscribes to the server closing.
    pub fn on_close<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .events
            .subscribe(ServerEventKind::Close, move |_| {
                handler();
                Admission::Allow
            });
    }

    /// Builds the axum router with the upgrade route at `config.path`.
    ///
    /// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`;
    /// the upgrade handler reads the peer address from `ConnectInfo`.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.inner.config.path, get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    /// Binds `host:port` and serves upgrades on a background task.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task,
    /// which finishes after [`WsServer::close`]. Fires `listening` once the
    /// socket is bound.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidAddress`] if `host:port` does not
    /// resolve, or [`SessionError::Bind`] if the socket cannot be bound.
    pub async fn listen(
        &self,
        host: &str,
        port: u16,
    ) -> Result<(SocketAddr, JoinHandle<()>), SessionError> {
        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| SessionError::InvalidAddress(format!("{host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| SessionError::InvalidAddress(format!("{host}:{port}")))?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, path = %self.inner.config.path, "server listening");
        let _ = self
            .inner
            .events
            .dispatch(&ServerEvent::Listening(local_addr));

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = self.inner.shutdown.clone();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            match served {
                Ok(()) => tracing::info!(addr = %local_addr, "listener stopped"),
                Err(err) => tracing::error!(addr = %local_addr, error = %err, "listener failed"),
            }
        });

        Ok((local_addr, handle))
    }

    /// Binds the host and port from the configuration.
    ///
    /// # Errors
    ///
    /// See [`WsServer::listen`].
    pub async fn listen_configured(&self) -> Result<(SocketAddr, JoinHandle<()>), SessionError> {
        let host = self.inner.config.host.clone();
        self.listen(&host, self.inner.config.port).await
    }

    /// Generic acceptor loop.
    ///
    /// Each `Ok` item is accepted on its own task. Each `Err` item is
    /// reported through the server `error` event and does not stop the
    /// loop. The loop ends when the stream ends or the server closes.
    pub async fn serve_incoming<S>(&self, incoming: S)
    where
        S: Stream<Item = Result<(Transport, PeerInfo), SessionError>>,
    {
        let mut incoming = std::pin::pin!(incoming);
        let shutdown = self.inner.shutdown.clone();

        loop {
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                next = incoming.next() => next,
            };
            let Some(next) = next else {
                break;
            };
            if self.is_closing() {
                break;
            }
            match next {
                Ok((transport, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move { server.accept(transport, peer).await });
                }
                Err(err) => self.report_accept_failure(err),
            }
        }

        tracing::debug!("acceptor stopped");
    }

    /// Registers one upgraded connection, decides admission, and drives the
    /// session until it closes.
    pub async fn accept(&self, transport: Transport, peer: PeerInfo) {
        let session = Session::from_transport(SessionRole::Server, transport, peer);
        let id = session.id();
        if !self.inner.clients.insert(session.clone()) {
            return;
        }

        let clients = Arc::clone(&self.inner.clients);
        session.on_close(move |code, _| {
            if clients.remove(id).is_some() {
                tracing::info!(session_id = %id, code, remaining = clients.len(), "client disconnected");
            }
        });

        tracing::info!(
            session_id = %id,
            remote = session.remote().unwrap_or("unknown"),
            clients = self.inner.clients.len(),
            "client connected"
        );

        let decisions = self
            .inner
            .events
            .dispatch(&ServerEvent::Connection(session.clone()));
        match Admission::combine(decisions) {
            Admission::Allow => session.run().await,
            Admission::Deny => {
                tracing::info!(session_id = %id, "connection denied");
                session
                    .close(CLOSE_PROTOCOL_ERROR, ACCESS_DENIED_REASON)
                    .await;
            }
        }
    }

    /// Reports a connection that failed to upgrade.
    pub fn report_accept_failure(&self, err: SessionError) {
        tracing::warn!(error = %err, "incoming connection failed");
        let _ = self.inner.events.dispatch(&ServerEvent::Error(err));
    }

    /// Stops admitting new connections.
    ///
    /// Existing sessions keep running until they close on their own. Fires
    /// the server `close` event on the first call only.
    pub fn close(&self) {
        if self.inner.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.shutdown.cancel();
        tracing::info!(clients = self.inner.clients.len(), "server closing");
        let _ = self.inner.events.dispatch(&ServerEvent::Close);
    }
}

impl fmt::Debug for WsServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsServer")
            .field("config", &self.inner.config)
            .field("clients", &self.inner.clients.len())
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}
