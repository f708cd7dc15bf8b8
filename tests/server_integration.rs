//! End-to-end tests over real sockets: a bound [`WsServer`] talking to
//! [`Session`] clients and raw `tokio-tungstenite` clients.

#![allow(clippy::panic)]

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use ws_session::config::ServerConfig;
use ws_session::domain::{ACCESS_DENIED_REASON, CLOSE_NORMAL, CLOSE_PROTOCOL_ERROR, SessionId};
use ws_session::service::WsServer;
use ws_session::ws::Session;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Boots an echo server on a free port. Peers are admitted while
/// `admit` returns `true`.
async fn boot_server(admit: bool) -> (String, WsServer) {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    };
    let server = WsServer::new(config);
    server.on_connection(move |session: &Session| {
        let echo = session.clone();
        session.on_message(move |text| {
            let echo = echo.clone();
            let reply = format!("Echo: {text}");
            tokio::spawn(async move {
                let _ = echo.send_text(reply).await;
            });
        });
        admit
    });

    let Ok((addr, _handle)) = server.listen_configured().await else {
        panic!("server failed to bind");
    };
    (format!("ws://{addr}/ws"), server)
}

async fn expect<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    match timeout(TIMEOUT, rx.recv()).await {
        Ok(Some(value)) => value,
        Ok(None) => panic!("channel closed"),
        Err(_) => panic!("timed out"),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if waited.is_err() {
        panic!("condition not met in time");
    }
}

/// A connected client session with its message and close streams.
struct Client {
    session: Session,
    messages: mpsc::UnboundedReceiver<String>,
    closed: mpsc::UnboundedReceiver<(u16, String)>,
    task: tokio::task::JoinHandle<()>,
}

async fn open_client(url: &str) -> Client {
    let session = Session::client(url);
    let (msg_tx, messages) = mpsc::unbounded_channel();
    session.on_message(move |text| {
        let _ = msg_tx.send(text.to_string());
    });
    let (close_tx, closed) = mpsc::unbounded_channel();
    session.on_close(move |code, reason| {
        let _ = close_tx.send((code, reason.to_string()));
    });
    let (open_tx, mut opened) = mpsc::unbounded_channel();
    session.on_open(move || {
        let _ = open_tx.send(());
    });

    let task = session.connect();
    expect(&mut opened).await;
    Client {
        session,
        messages,
        closed,
        task,
    }
}

#[tokio::test]
async fn echo_round_trip() {
    let (url, server) = boot_server(true).await;
    let mut client = open_client(&url).await;

    tokio_test::assert_ok!(client.session.send_text("Hello, world!").await);
    assert_eq!(expect(&mut client.messages).await, "Echo: Hello, world!");
    assert!(
        timeout(Duration::from_millis(200), client.messages.recv())
            .await
            .is_err(),
        "exactly one reply expected"
    );
    assert_eq!(server.clients().len(), 1);

    client.session.close(CLOSE_NORMAL, "bye").await;
    assert_eq!(
        expect(&mut client.closed).await,
        (CLOSE_NORMAL, "bye".to_string())
    );
    tokio_test::assert_ok!(client.task.await);
    wait_until(|| server.clients().is_empty()).await;
}

#[tokio::test]
async fn denied_client_sees_access_denied() {
    let (url, server) = boot_server(false).await;

    let Ok((mut ws, _response)) = connect_async(url.as_str()).await else {
        panic!("handshake failed");
    };
    let frame = loop {
        match timeout(TIMEOUT, ws.next()).await {
            Ok(Some(Ok(Message::Close(frame)))) => break frame,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected text: {text}"),
            Ok(Some(Ok(_))) => {}
            other => panic!("expected a close frame, got {other:?}"),
        }
    };
    let Some(frame) = frame else {
        panic!("close frame without status");
    };
    assert_eq!(u16::from(frame.code), CLOSE_PROTOCOL_ERROR);
    assert_eq!(frame.reason.as_str(), ACCESS_DENIED_REASON);

    wait_until(|| server.clients().is_empty()).await;
}

#[tokio::test]
async fn denied_session_client_gets_close_event() {
    let (url, server) = boot_server(false).await;

    let session = Session::client(url);
    let (close_tx, mut closed) = mpsc::unbounded_channel();
    session.on_close(move |code, reason| {
        let _ = close_tx.send((code, reason.to_string()));
    });
    let task = session.connect();

    assert_eq!(
        expect(&mut closed).await,
        (CLOSE_PROTOCOL_ERROR, ACCESS_DENIED_REASON.to_string())
    );
    tokio_test::assert_ok!(task.await);
    assert!(server.clients().is_empty());
}

#[tokio::test]
async fn closing_one_client_leaves_the_other() {
    let (url, server) = boot_server(true).await;
    let mut a = open_client(&url).await;
    let mut b = open_client(&url).await;
    wait_until(|| server.clients().len() == 2).await;
    let before: Vec<SessionId> = server.clients().ids();

    a.session.close(CLOSE_NORMAL, "").await;
    let _ = expect(&mut a.closed).await;
    wait_until(|| server.clients().len() == 1).await;
    let after = server.clients().ids();
    assert!(after.iter().all(|id| before.contains(id)));

    tokio_test::assert_ok!(b.session.send_text("still here").await);
    assert_eq!(expect(&mut b.messages).await, "Echo: still here");
}

#[tokio::test]
async fn plain_http_request_is_not_upgraded() {
    let (url, server) = boot_server(true).await;
    let http_url = url.replacen("ws://", "http://", 1);

    let Ok(response) = reqwest::get(&http_url).await else {
        panic!("request failed");
    };
    assert!(!response.status().is_success());
    assert!(server.clients().is_empty());
}

#[tokio::test]
async fn server_close_keeps_existing_sessions() {
    let (url, server) = boot_server(true).await;
    let mut client = open_client(&url).await;
    wait_until(|| server.clients().len() == 1).await;

    server.close();
    assert!(server.is_closing());

    tokio_test::assert_ok!(client.session.send_text("after close").await);
    assert_eq!(expect(&mut client.messages).await, "Echo: after close");
    assert_eq!(server.clients().len(), 1);
}

#[tokio::test]
async fn upgrade_without_key_is_rejected() {
    let (url, server) = boot_server(true).await;
    let http_url = url.replacen("ws://", "http://", 1);

    let sent = reqwest::Client::new()
        .get(&http_url)
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .send()
        .await;
    let Ok(response) = sent else {
        panic!("request failed");
    };

    assert!(response.status().is_client_error(), "got {}", response.status());
    assert!(server.clients().is_empty());
}
