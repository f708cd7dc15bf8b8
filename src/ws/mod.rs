//! WebSocket layer: transports, the session state machine, and the axum
//! upgrade handler.
//!
//! The upgrade endpoint (default `/ws`) hands each upgraded socket to
//! [`crate::service::WsServer`], which wraps it in a [`Session`].

pub mod frame;
pub mod handler;
pub mod memory;
pub mod session;
pub mod transport;

pub use frame::{Inbound, Outbound, Payload};
pub use session::{PeerInfo, Session};
pub use transport::Transport;
