//! Service layer: the WebSocket server and its connection registry.

pub mod ws_server;

pub use ws_server::WsServer;
