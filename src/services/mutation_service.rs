use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::admin::TokenValueResponse,
    error::ServiceError,
    services::{session_service, sse_events},
    state::{SharedState, feed::TokenUpdate},
};

/// Requested change to a department counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenChange {
    Increment,
    Decrement,
    Set(u32),
}

/// Advance the "now serving" counter by one.
pub async fn increment_token(
    state: &SharedState,
    session_id: Uuid,
    department: &str,
) -> Result<TokenValueResponse, ServiceError> {
    mutate(state, session_id, department, TokenChange::Increment).await
}

/// Step the counter back by one, refusing to go below zero.
pub async fn decrement_token(
    state: &SharedState,
    session_id: Uuid,
    department: &str,
) -> Result<TokenValueResponse, ServiceError> {
    mutate(state, session_id, department, TokenChange::Decrement).await
}

/// Overwrite the counter with an explicit value.
pub async fn set_token(
    state: &SharedState,
    session_id: Uuid,
    department: &str,
    value: u32,
) -> Result<TokenValueResponse, ServiceError> {
    mutate(state, session_id, department, TokenChange::Set(value)).await
}

/// Shared write path: authorize, compute, persist, then mirror.
///
/// The mirror and the feed only see values the store has confirmed; a failed
/// or timed-out write leaves both untouched.
async fn mutate(
    state: &SharedState,
    session_id: Uuid,
    department: &str,
    change: TokenChange,
) -> Result<TokenValueResponse, ServiceError> {
    session_service::authorize_unlocked(state, session_id, department).await?;

    let gate = state.mutation_gate(department).ok_or_else(|| {
        ServiceError::NotFound(format!("unknown department `{department}`"))
    })?;
    let Ok(_guard) = gate.try_lock() else {
        return Err(ServiceError::InvalidState(
            "another update for this department is still in flight".into(),
        ));
    };

    let value = next_value(state, department, change).await?;

    let store = state.require_token_store().await?;
    let write = store.put_token(department.to_owned(), value);
    match state.mutation_timeout() {
        Some(limit) => match timeout(limit, write).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(department, value, "token write timed out");
                return Err(ServiceError::Timeout);
            }
        },
        None => write.await?,
    }

    // Mirror first, then fan out, all under the board guard so concurrent
    // snapshot broadcasts cannot interleave between the two.
    let mut board = state.board().write().await;
    let changed = match board.as_mut() {
        Some(board) => board.apply(department, value),
        None => true,
    };
    if changed {
        state.feed().publish(TokenUpdate {
            department: department.to_owned(),
            value,
        });
        sse_events::broadcast_token_updated(state, department, value);
    }
    drop(board);

    info!(department, value, "token value confirmed");
    Ok(TokenValueResponse::new(department, value))
}

/// Work out the value to persist, validating against the mirrored state
/// before any network round-trip.
async fn next_value(
    state: &SharedState,
    department: &str,
    change: TokenChange,
) -> Result<u32, ServiceError> {
    match change {
        TokenChange::Set(value) => Ok(value),
        TokenChange::Increment => {
            let current = current_value(state, department).await?;
            current.checked_add(1).ok_or_else(|| {
                ServiceError::InvalidInput("counter is already at its maximum".into())
            })
        }
        TokenChange::Decrement => {
            let current = current_value(state, department).await?;
            if current == 0 {
                return Err(ServiceError::InvalidInput(
                    "counter is already at zero".into(),
                ));
            }
            Ok(current - 1)
        }
    }
}

async fn current_value(state: &SharedState, department: &str) -> Result<u32, ServiceError> {
    let guard = state.board().read().await;
    let board = guard.as_ref().ok_or(ServiceError::Degraded)?;
    board.value(department).ok_or_else(|| {
        ServiceError::NotFound(format!("no counter for department `{department}`"))
    })
}
