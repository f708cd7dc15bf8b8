//! Serialisable snapshot of a registered session.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{SessionId, SessionRole, SessionState};

/// Point-in-time view of one session, suitable for logging or an admin
/// endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    /// Session identifier.
    pub id: SessionId,
    /// Client or server side.
    pub role: SessionRole,
    /// Lifecycle state when the snapshot was taken.
    pub state: SessionState,
    /// Remote address or URL, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// When the session was created.
    pub connected_at: DateTime<Utc>,
}
