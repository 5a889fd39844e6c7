//! Digest handler.

use crate::api::AppState;
use crate::error::Result;
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

/// Response header naming where the digest came from (`fresh`, `cache` or `stale`)
pub const DIGEST_SOURCE_HEADER: &str = "x-digest-source";

/// GET /digest - Newest articles per subscribed site
///
/// Also served at `/`.
#[utoipa::path(
    get,
    path = "/digest",
    tag = "digest",
    responses(
        (status = 200, description = "Up to ten newest articles per site, keyed by site name",
            body = std::collections::BTreeMap<String, Vec<crate::digest::FormattedArticle>>,
            headers(("x-digest-source" = String, description = "fresh, cache or stale"))),
        (status = 502, description = "Upstream login, listing or fetching failed and nothing is cached", body = crate::error::ApiError),
        (status = 504, description = "Upstream timed out and nothing is cached", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn get_digest(State(state): State<AppState>) -> Result<Response> {
    let response = state.service.get_digest().await?;

    Ok((
        [(DIGEST_SOURCE_HEADER, response.source.as_str())],
        Json(response.digest.as_ref()),
    )
        .into_response())
}
