//! ws-session echo server entry point.
//!
//! Replies `Echo: <text>` to every text message and shuts down on Ctrl-C.

use tracing_subscriber::EnvFilter;

use ws_session::config::ServerConfig;
use ws_session::service::WsServer;
use ws_session::ws::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = config.port, path = %config.path, "starting ws-session");

    let server = WsServer::new(config);
    let registry = server.clone();
    server.on_connection(move |session: &Session| {
        tracing::info!(session_id = %session.id(), remote = ?session.remote(), "new client");

        let echo = session.clone();
        session.on_message(move |text| {
            let echo = echo.clone();
            let reply = format!("Echo: {text}");
            tokio::spawn(async move {
                if let Err(err) = echo.send_text(reply).await {
                    tracing::warn!(session_id = %echo.id(), error = %err, "echo failed");
                }
            });
        });

        let registry = registry.clone();
        session.on_close(move |code, reason| {
            let clients = serde_json::to_string(&registry.clients().list())
                .unwrap_or_else(|_| "[]".to_string());
            tracing::info!(code, reason, %clients, "client left");
        });
    });

    let (addr, serve) = server.listen_configured().await?;
    tracing::info!(%addr, "echo server ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    server.close();
    serve.await?;

    Ok(())
}
