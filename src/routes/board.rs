//! Public board endpoints: token snapshot and department registry.

use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::board::{DepartmentsResponse, TokenSnapshotResponse},
    error::AppError,
    services::board_service,
    state::SharedState,
};

/// Return the current "now serving" value for every department.
#[utoipa::path(
    get,
    path = "/board/tokens",
    tag = "board",
    responses(
        (status = 200, description = "Token values in board order", body = TokenSnapshotResponse),
        (status = 503, description = "Board not hydrated from storage yet"),
    )
)]
pub async fn token_snapshot(
    State(state): State<SharedState>,
) -> Result<Json<TokenSnapshotResponse>, AppError> {
    Ok(Json(board_service::token_snapshot(&state).await?))
}

/// List the departments this board serves, without their PINs.
#[utoipa::path(
    get,
    path = "/board/departments",
    tag = "board",
    responses(
        (status = 200, description = "Departments in board order", body = DepartmentsResponse),
    )
)]
pub async fn list_departments(State(state): State<SharedState>) -> Json<DepartmentsResponse> {
    Json(board_service::departments(&state))
}

/// Configure the public board routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/board/tokens", get(token_snapshot))
        .route("/board/departments", get(list_departments))
}
