use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::admin::{PinSubmission, SessionStatusResponse, SetTokenRequest, TokenValueResponse},
    error::AppError,
    services::{mutation_service, session_service},
    state::SharedState,
};

const SESSION_HEADER: &str = "x-admin-session";

/// Admin session identifier extracted by the session middleware.
#[derive(Clone, Copy, Debug)]
pub struct SessionId(pub Uuid);

/// Admin-only endpoints for unlocking sessions and editing token values.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/{department}/pin", post(submit_pin))
        .route("/admin/{department}/lock", post(lock_session))
        .route("/admin/{department}/activity", post(record_activity))
        .route(
            "/admin/{department}/token/increment",
            post(increment_token),
        )
        .route(
            "/admin/{department}/token/decrement",
            post(decrement_token),
        )
        .route("/admin/{department}/token", put(set_token))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

/// Submit a PIN attempt to unlock the session for its department.
#[utoipa::path(
    post,
    path = "/admin/{department}/pin",
    tag = "admin",
    params(("X-Admin-Session" = String, Header, description = "Session identifier issued by the /sse/admin/{department} stream"),
    ("department" = String, Path, description = "Department the session is bound to")),
    request_body = PinSubmission,
    responses(
        (status = 200, description = "Session unlocked", body = SessionStatusResponse),
        (status = 401, description = "Incorrect PIN or unauthorized session"),
        (status = 503, description = "PIN verification unavailable or timed out")
    )
)]
pub async fn submit_pin(
    State(state): State<SharedState>,
    Path(department): Path<String>,
    Extension(SessionId(session)): Extension<SessionId>,
    Json(payload): Json<PinSubmission>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    payload.validate()?;
    let status = session_service::submit_pin(&state, session, &department, payload.pin).await?;
    Ok(Json(status))
}

/// Relock the session without waiting for the inactivity timeout.
#[utoipa::path(
    post,
    path = "/admin/{department}/lock",
    tag = "admin",
    params(("X-Admin-Session" = String, Header, description = "Session identifier issued by the /sse/admin/{department} stream"),
    ("department" = String, Path, description = "Department the session is bound to")),
    responses(
        (status = 200, description = "Session locked", body = SessionStatusResponse),
        (status = 409, description = "Session is not unlocked")
    )
)]
pub async fn lock_session(
    State(state): State<SharedState>,
    Path(department): Path<String>,
    Extension(SessionId(session)): Extension<SessionId>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(
        session_service::lock_session(&state, session, &department).await?,
    ))
}

/// Report admin interaction so the inactivity timer restarts.
#[utoipa::path(
    post,
    path = "/admin/{department}/activity",
    tag = "admin",
    params(("X-Admin-Session" = String, Header, description = "Session identifier issued by the /sse/admin/{department} stream"),
    ("department" = String, Path, description = "Department the session is bound to")),
    responses((status = 200, description = "Activity recorded", body = SessionStatusResponse))
)]
pub async fn record_activity(
    State(state): State<SharedState>,
    Path(department): Path<String>,
    Extension(SessionId(session)): Extension<SessionId>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(
        session_service::record_activity(&state, session, &department).await?,
    ))
}

/// Advance the department's "now serving" counter by one.
#[utoipa::path(
    post,
    path = "/admin/{department}/token/increment",
    tag = "admin",
    params(("X-Admin-Session" = String, Header, description = "Session identifier issued by the /sse/admin/{department} stream"),
    ("department" = String, Path, description = "Department whose counter to advance")),
    responses(
        (status = 200, description = "Counter advanced", body = TokenValueResponse),
        (status = 401, description = "Session is not unlocked for this department"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn increment_token(
    State(state): State<SharedState>,
    Path(department): Path<String>,
    Extension(SessionId(session)): Extension<SessionId>,
) -> Result<Json<TokenValueResponse>, AppError> {
    Ok(Json(
        mutation_service::increment_token(&state, session, &department).await?,
    ))
}

/// Step the department's "now serving" counter back by one.
#[utoipa::path(
    post,
    path = "/admin/{department}/token/decrement",
    tag = "admin",
    params(("X-Admin-Session" = String, Header, description = "Session identifier issued by the /sse/admin/{department} stream"),
    ("department" = String, Path, description = "Department whose counter to step back")),
    responses(
        (status = 200, description = "Counter stepped back", body = TokenValueResponse),
        (status = 400, description = "Counter is already at zero"),
        (status = 401, description = "Session is not unlocked for this department"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn decrement_token(
    State(state): State<SharedState>,
    Path(department): Path<String>,
    Extension(SessionId(session)): Extension<SessionId>,
) -> Result<Json<TokenValueResponse>, AppError> {
    Ok(Json(
        mutation_service::decrement_token(&state, session, &department).await?,
    ))
}

/// Overwrite the department's counter with an explicit value.
#[utoipa::path(
    put,
    path = "/admin/{department}/token",
    tag = "admin",
    params(("X-Admin-Session" = String, Header, description = "Session identifier issued by the /sse/admin/{department} stream"),
    ("department" = String, Path, description = "Department whose counter to overwrite")),
    request_body = SetTokenRequest,
    responses(
        (status = 200, description = "Counter overwritten", body = TokenValueResponse),
        (status = 400, description = "Value out of range"),
        (status = 401, description = "Session is not unlocked for this department"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn set_token(
    State(state): State<SharedState>,
    Path(department): Path<String>,
    Extension(SessionId(session)): Extension<SessionId>,
    Json(payload): Json<SetTokenRequest>,
) -> Result<Json<TokenValueResponse>, AppError> {
    payload.validate()?;
    let value = u32::try_from(payload.value)
        .map_err(|_| AppError::BadRequest("token value out of range".into()))?;
    Ok(Json(
        mutation_service::set_token(&state, session, &department, value).await?,
    ))
}

async fn require_session(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing session header `X-Admin-Session`".into())
        })?;

    let session = Uuid::parse_str(&provided)
        .map_err(|_| AppError::Unauthorized("malformed session identifier".into()))?;

    if state.session(&session).is_none() {
        return Err(AppError::Unauthorized(
            "unknown or expired admin session".into(),
        ));
    }

    req.extensions_mut().insert(SessionId(session));
    Ok(next.run(req).await)
}
