//! Axum WebSocket upgrade handler.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::{PeerInfo, Transport};
use crate::error::SessionError;
use crate::service::WsServer;

/// `GET {config.path}`: upgrade the HTTP connection and hand the socket to
/// [`WsServer::accept`].
///
/// Requests that arrive after [`WsServer::close`] get `503`. Failed upgrades
/// are reported through the server `error` event.
pub async fn ws_handler(
    State(server): State<WsServer>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if server.is_closing() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let max_message_size = server.config().max_message_size;
    let max_frame_size = server.config().max_frame_size;
    let peer = PeerInfo::new(addr.to_string()).with_headers(headers);
    let on_failure = server.clone();

    ws.max_message_size(max_message_size)
        .max_frame_size(max_frame_size)
        .on_failed_upgrade(move |err: axum::Error| {
            on_failure.report_accept_failure(SessionError::Accept(err.to_string()));
        })
        .on_upgrade(move |socket| async move {
            server.accept(Transport::from_axum(socket), peer).await;
        })
}
