use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{
        admin::lock_reason,
        board::{TokenEntry, format_token},
    },
    state::session::LockCause,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`board` or `session`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Session identifier to echo back in the `x-admin-session` header.
    /// Only present on admin streams.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Department the admin stream is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever a department's counter takes a confirmed new value.
pub struct TokenUpdatedEvent {
    pub department: String,
    pub value: u32,
    /// Zero-padded rendering used by the display boards.
    pub display: String,
}

impl TokenUpdatedEvent {
    /// Build the event for a confirmed value.
    pub fn new(department: impl Into<String>, value: u32) -> Self {
        Self {
            department: department.into(),
            value,
            display: format_token(value),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Full board state, broadcast after every (re)hydration and to each new
/// public subscriber so late joiners converge immediately.
pub struct BoardSnapshotEvent {
    pub tokens: Vec<TokenEntry>,
    /// RFC 3339 timestamp of the last applied change.
    pub as_of: String,
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted on a session stream when its PIN was accepted.
pub struct SessionUnlockedEvent {
    pub department: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted on a session stream when it returns to the locked phase.
pub struct SessionLockedEvent {
    pub department: String,
    /// Machine-readable lock cause (`incorrect_pin`, `inactivity`, ...).
    pub reason: String,
    /// Prompt the panel can show verbatim.
    pub message: String,
}

impl SessionLockedEvent {
    /// Build the event for a lock cause, if the cause is reportable.
    pub fn new(department: impl Into<String>, cause: LockCause) -> Option<Self> {
        lock_reason(cause).map(|(reason, message)| Self {
            department: department.into(),
            reason: reason.to_owned(),
            message: message.to_owned(),
        })
    }
}
