use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Token Board Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::board::token_snapshot,
        crate::routes::board::list_departments,
        crate::routes::sse::board_stream,
        crate::routes::sse::session_stream,
        crate::routes::admin::submit_pin,
        crate::routes::admin::lock_session,
        crate::routes::admin::record_activity,
        crate::routes::admin::increment_token,
        crate::routes::admin::decrement_token,
        crate::routes::admin::set_token,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::board::TokenEntry,
            crate::dto::board::TokenSnapshotResponse,
            crate::dto::board::DepartmentSummary,
            crate::dto::board::DepartmentsResponse,
            crate::dto::admin::PinSubmission,
            crate::dto::admin::SetTokenRequest,
            crate::dto::admin::SessionStatusResponse,
            crate::dto::admin::TokenValueResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::TokenUpdatedEvent,
            crate::dto::sse::BoardSnapshotEvent,
            crate::dto::sse::SessionUnlockedEvent,
            crate::dto::sse::SessionLockedEvent,
            crate::dto::sse::SystemStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "board", description = "Public token board reads"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "admin", description = "PIN-gated token mutations"),
    )
)]
pub struct ApiDoc;
