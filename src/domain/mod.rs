//! Domain layer: identities, events, dispatch, and the client registry.
//!
//! This module holds the types shared by sessions and the server: the
//! session identifier and lifecycle state, the typed session and server
//! events with their synchronous dispatcher, and the concurrent registry of
//! live sessions.

pub mod client_registry;
pub mod client_summary;
pub mod dispatcher;
pub mod server_event;
pub mod session_event;
pub mod session_id;
pub mod session_state;

pub use client_registry::ClientRegistry;
pub use client_summary::ClientSummary;
pub use dispatcher::{Event, EventDispatcher, Handler};
pub use server_event::{Admission, ServerEvent, ServerEventKind};
pub use session_event::{
    ACCESS_DENIED_REASON, CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, CLOSE_PROTOCOL_ERROR,
    SessionEvent, SessionEventKind,
};
pub use session_id::SessionId;
pub use session_state::{SessionRole, SessionState};
