use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        board::TokenEntry,
        format_system_time,
        sse::{
            BoardSnapshotEvent, Handshake, ServerEvent, SessionLockedEvent, SessionUnlockedEvent,
            SystemStatus, TokenUpdatedEvent,
        },
    },
    state::{SharedState, SseHub, session::LockCause},
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_TOKEN_UPDATED: &str = "token.updated";
const EVENT_BOARD_SNAPSHOT: &str = "board.snapshot";
const EVENT_SESSION_UNLOCKED: &str = "session.unlocked";
const EVENT_SESSION_LOCKED: &str = "session.locked";
const EVENT_SYSTEM_DEGRADED: &str = "system.degraded";

/// Greet board subscribers when a new public stream connects.
pub async fn broadcast_board_handshake(state: &SharedState) {
    let payload = Handshake {
        stream: "board".to_string(),
        message: "subscribed to token updates".to_string(),
        degraded: state.is_degraded().await,
        session: None,
        department: None,
    };
    send_event(state.public_sse(), EVENT_HANDSHAKE, &payload);
}

/// Hand the session identifier to a freshly connected admin stream.
pub async fn broadcast_session_handshake(
    state: &SharedState,
    hub: &SseHub,
    session: Uuid,
    department: &str,
) {
    let payload = Handshake {
        stream: "session".to_string(),
        message: "admin session opened; unlock with the department PIN".to_string(),
        degraded: state.is_degraded().await,
        session: Some(session.simple().to_string()),
        department: Some(department.to_owned()),
    };
    send_event(hub, EVENT_HANDSHAKE, &payload);
}

/// Fan a confirmed counter change out to the board and matching sessions.
pub fn broadcast_token_updated(state: &SharedState, department: &str, value: u32) {
    let payload = TokenUpdatedEvent::new(department, value);
    send_event(state.public_sse(), EVENT_TOKEN_UPDATED, &payload);

    for entry in state.sessions().iter() {
        if entry.department == department {
            send_event(&entry.events, EVENT_TOKEN_UPDATED, &payload);
        }
    }
}

/// Broadcast the whole board so every subscriber converges on current values.
///
/// Does nothing while the board is not hydrated yet.
pub async fn broadcast_board_snapshot(state: &SharedState) {
    let degraded = state.is_degraded().await;
    let guard = state.board().read().await;
    let Some(board) = guard.as_ref() else {
        return;
    };

    let payload = BoardSnapshotEvent {
        tokens: board
            .entries()
            .map(|(department, value)| TokenEntry::new(department, value))
            .collect(),
        as_of: format_system_time(board.as_of()),
        degraded,
    };

    send_event(state.public_sse(), EVENT_BOARD_SNAPSHOT, &payload);
    for entry in state.sessions().iter() {
        send_event(&entry.events, EVENT_BOARD_SNAPSHOT, &payload);
    }
}

/// Tell one admin stream that its PIN was accepted.
pub fn broadcast_session_unlocked(hub: &SseHub, department: &str) {
    let payload = SessionUnlockedEvent {
        department: department.to_owned(),
    };
    send_event(hub, EVENT_SESSION_UNLOCKED, &payload);
}

/// Tell one admin stream that it returned to the locked phase and why.
pub fn broadcast_session_locked(hub: &SseHub, department: &str, cause: LockCause) {
    let Some(payload) = SessionLockedEvent::new(department, cause) else {
        return;
    };
    send_event(hub, EVENT_SESSION_LOCKED, &payload);
}

/// Tell every subscriber that the degraded flag flipped.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_event(state.public_sse(), EVENT_SYSTEM_DEGRADED, &payload);
    for entry in state.sessions().iter() {
        send_event(&entry.events, EVENT_SYSTEM_DEGRADED, &payload);
    }
}

/// Forward degraded flag changes to every connected client.
pub async fn run_degraded_notifier(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    loop {
        if watcher.changed().await.is_err() {
            break;
        }
        let degraded = *watcher.borrow_and_update();
        broadcast_system_status(&state, degraded);
    }
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
