//! System handlers: health and OpenAPI.

use crate::api::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the server is answering
    pub status: String,

    /// Crate version
    pub version: String,

    /// Cached digest, if any run has succeeded yet
    pub cache: Option<CacheStatus>,
}

/// State of the digest cache
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CacheStatus {
    /// Seconds since the digest was committed
    pub age_secs: u64,

    /// Number of sites in the digest
    pub sites: usize,

    /// Number of articles across sites
    pub articles: usize,

    /// Configured time-to-live in seconds
    pub ttl_secs: u64,
}

/// GET /health - Health check
///
/// Never contacts upstream.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state
        .service
        .cache()
        .snapshot()
        .await
        .map(|entry| CacheStatus {
            age_secs: entry.age().as_secs(),
            sites: entry.digest.len(),
            articles: entry.digest.article_count(),
            ttl_secs: state.config.cache.ttl.as_secs(),
        });

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache,
    })
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3 specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// Fallback for unknown routes
pub async fn not_found(uri: axum::http::Uri) -> impl IntoResponse {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(crate::error::ApiError::not_found(format!("route {}", uri.path()))),
    )
}
