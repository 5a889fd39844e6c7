use super::*;
use crate::Config;
use crate::config::Credentials;
use crate::error::Error;
use crate::reader::{AuthToken, Link, RawArticle, ReaderSource, Subscription};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;


/// Upstream stand-in serving one site with a fixed set of articles
#[derive(Default)]
struct StubSource {
    reject_login: AtomicBool,
    logins: AtomicUsize,
}

#[async_trait::async_trait]
impl ReaderSource for StubSource {
    async fn login(&self, _credentials: &Credentials) -> crate::Result<AuthToken> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(Error::Auth {
                reason: "no auth token in login response (status 401)".to_string(),
            });
        }
        Ok(AuthToken::new("stub"))
    }

    async fn list_subscriptions(&self, _token: &AuthToken) -> crate::Result<Vec<Subscription>> {
        Ok(vec![Subscription {
            id: "feed/news".to_string(),
            title: "News".to_string(),
            icon_url: "https://reader.example/icons/news.png".to_string(),
        }])
    }

    async fn fetch_articles(
        &self,
        _token: &AuthToken,
        _stream_id: &str,
    ) -> crate::Result<Vec<RawArticle>> {
        Ok((0..3)
            .rev()
            .map(|i| RawArticle {
                title: Some(format!("Story {i}")),
                summary: None,
                alternate: vec![Link {
                    href: Some(format!("https://news.example/{i}")),
                }],
                published: 1_700_000_000 + i,
            })
            .collect())
    }
}

fn test_config() -> Config {
    let mut config = Config {
        credentials: Credentials::new("me@example.com", "secret"),
        ..Config::default()
    };
    config.cache.ttl = Duration::from_secs(300);
    config.server.bind_address = "127.0.0.1:0".parse().unwrap();
    config
}

fn router_with(source: Arc<StubSource>, config: Config) -> Router {
    let service = Arc::new(DigestService::new(&config, source).unwrap());
    create_router(service, Arc::new(config))
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_shuts_down() {
    let config = Arc::new(test_config());
    let service = Arc::new(DigestService::new(&config, Arc::new(StubSource::default())).unwrap());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(start_api_server(service, config, async {
        rx.await.ok();
    }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_any_origin() {
    let app = router_with(Arc::new(StubSource::default()), test_config());

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_allow_list() {
    let mut config = test_config();
    config.server.cors_origins = vec!["https://dash.example".to_string()];
    let app = router_with(Arc::new(StubSource::default()), config);

    let allowed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "https://dash.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        allowed
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://dash.example"
    );

    let denied = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(denied.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = router_with(Arc::new(StubSource::default()), test_config());

    let response = get(&app, "/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "not_found");
}
