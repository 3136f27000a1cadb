use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the token store connection is currently missing.
    pub degraded: bool,
}

impl HealthResponse {
    /// Build the response from the degraded flag.
    pub fn from_degraded(degraded: bool) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            degraded,
        }
    }
}
