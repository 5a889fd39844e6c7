//! Shared helpers for integration tests: a mock reader API and config builder.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use reader_digest::{Config, DigestService};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "reader@example.com";
pub const PASSWORD: &str = "pass!word'(x)*";
pub const TOKEN: &str = "integration-token";

/// Build a config pointing at the mock server, with fast retries and no pauses
pub fn config_for(server: &MockServer, overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("READER_USERNAME", USERNAME),
        ("READER_PASSWORD", PASSWORD),
        ("READER_USER_AGENT", "reader-digest-it/1.0"),
        ("MAX_ITEMS_PER_FEED", "50"),
        ("REQUEST_TIMEOUT_MS", "1000"),
        ("MAX_RETRIES", "2"),
        ("RETRY_BASE_DELAY_MS", "10"),
        ("BATCH_SIZE", "2"),
        ("BATCH_PAUSE_MS", "10"),
        ("ICON_BASE_URL", "https://cdn.example/icons"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert("READER_API_BASE".to_string(), server.uri());
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("config parses");
    config.validate().expect("config is valid");
    config
}

pub fn router_for(config: Config) -> Router {
    let service = Arc::new(DigestService::from_config(&config).expect("service builds"));
    reader_digest::api::create_router(service, Arc::new(config))
}

pub async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn mount_login(server: &MockServer, body: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mount a listing of `sites`; each site `x` has stream id `feed/x`
pub async fn mount_listing(server: &MockServer, sites: &[&str]) {
    let subscriptions: Vec<_> = sites
        .iter()
        .map(|site| {
            serde_json::json!({
                "id": format!("feed/{site}"),
                "title": site,
                "iconUrl": format!("https://reader.example/icons/{site}.ico?v=1"),
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/reader/api/0/subscription/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "subscriptions": subscriptions })),
        )
        .mount(server)
        .await;
}

/// Stream contents with `count` items published at `base + i`
pub fn stream_body(site: &str, count: usize, base: i64) -> serde_json::Value {
    let items: Vec<_> = (0..count)
        .map(|i| {
            serde_json::json!({
                "title": format!("{site} story {i}"),
                "published": base + i as i64,
                "alternate": [{ "href": format!("https://{site}.example/{i}") }],
                "summary": { "content": format!("<p>Story <b>{i}</b> from {site}</p>") },
            })
        })
        .collect();
    serde_json::json!({ "items": items })
}

pub async fn mount_stream(server: &MockServer, site: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path_regex(format!(
            "^/reader/api/0/stream/contents/feed%2F{site}$"
        )))
        .respond_with(template)
        .mount(server)
        .await;
}
