//! # ws-session
//!
//! WebSocket session layer with typed per-connection events and a server
//! that keeps a live registry of connected sessions.
//!
//! A [`ws::Session`] wraps one connection (client or server side) and turns
//! its frames into ordered events: `open`, `message`, `binary`, `ping`,
//! `pong`, `error` and exactly one terminal `close`. A [`service::WsServer`]
//! accepts upgrades, lets `connection` handlers admit or deny each peer,
//! and tracks every admitted session by id until it closes.
//!
//! ## Architecture
//!
//! ```text
//! Peers (WebSocket)
//!     │
//!     ├── Upgrade Handler (ws/handler)
//!     │
//!     ├── WsServer (service/)  ──  ClientRegistry (domain/)
//!     │
//!     ├── Session (ws/session) ──  EventDispatcher (domain/)
//!     │
//!     └── Transport (ws/transport): axum · tokio-tungstenite · in-memory
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
