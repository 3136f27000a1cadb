use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::{
        sse_events,
        sse_service::{self, StreamKind},
    },
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/board",
    tag = "sse",
    responses((status = 200, description = "Board SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream realtime token updates to connected displays.
pub async fn board_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_board(&state);
    info!("New board SSE connection");
    sse_events::broadcast_board_handshake(&state).await;
    sse_events::broadcast_board_snapshot(&state).await;
    sse_service::to_sse_stream(receiver, StreamKind::Board)
}

#[utoipa::path(
    get,
    path = "/sse/admin/{department}",
    tag = "sse",
    params(("department" = String, Path, description = "Department identifier from the registry")),
    responses(
        (status = 200, description = "Admin session SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown department"),
    )
)]
/// Stream admin session events, establishing a locked session for one department.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(department): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, session, entry) = sse_service::open_session_stream(&state, &department)?;
    info!(session = %session, department, "New admin SSE connection");
    sse_events::broadcast_session_handshake(&state, &entry.events, session, &entry.department).await;
    Ok(sse_service::to_sse_stream(
        receiver,
        StreamKind::Session(state, session),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/board", get(board_stream))
        .route("/sse/admin/{department}", get(session_stream))
}
