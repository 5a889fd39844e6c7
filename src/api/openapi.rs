//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa and served at
//! `/openapi.json`.

use utoipa::OpenApi;

/// OpenAPI documentation for the reader-digest HTTP API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "reader-digest API",
        description = "Compact per-site digest of the newest articles from a Google-Reader-compatible aggregator",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    paths(
        crate::api::routes::get_digest,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::digest::FormattedArticle,
        crate::api::routes::HealthResponse,
        crate::api::routes::CacheStatus,
        crate::error::ApiError,
    )),
    tags(
        (name = "digest", description = "Newest articles per subscribed site"),
        (name = "system", description = "Health check and OpenAPI specification"),
    )
)]
pub struct ApiDoc;
