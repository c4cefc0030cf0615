use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" when the process answers
    pub status: String,
    pub service: String,
    /// API version
    pub version: String,
    /// Server time, RFC 3339
    pub timestamp: String,
    /// Active cache store: "redis" or "memory"
    pub cache_backend: String,
}

/// Health check endpoint.
///
/// Reports the cache store chosen at startup. Does not probe the external
/// store: a flaky Redis degrades to misses, not to an unhealthy service.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        cache_backend: state.cache.backend_name().to_string(),
    })
}
