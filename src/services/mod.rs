/// Public token board reads.
pub mod board_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// PIN-gated token mutation gateway.
pub mod mutation_service;
/// Admin session lifecycle and PIN verification.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage reconnection and mirror hydration coordinator.
pub mod storage_supervisor;
/// Store snapshot mirroring with change replay.
pub mod sync_service;
