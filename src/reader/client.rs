//! HTTP implementation of [`ReaderSource`]

use super::ReaderSource;
use super::auth::{encode_component, extract_token, login_url};
use super::types::{AuthToken, RawArticle, Subscription, sort_newest_first};
use crate::config::{Credentials, HttpConfig, UpstreamConfig};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestOptions};
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Stream contents document
#[derive(Debug, Default, Deserialize)]
struct StreamContents {
    #[serde(default)]
    items: Vec<RawArticle>,
}

/// Production [`ReaderSource`] speaking the reader HTTP API
pub struct ReaderClient {
    upstream: UpstreamConfig,
    http_config: HttpConfig,
    /// Swapped for a fresh client (and cookie jar) on each login when cookies are kept
    http: RwLock<Arc<HttpClient>>,
}

impl ReaderClient {
    /// Create a client for the configured upstream
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(upstream: UpstreamConfig, http_config: HttpConfig) -> Result<Self> {
        let http = HttpClient::new(&http_config)?;
        Ok(Self {
            upstream,
            http_config,
            http: RwLock::new(Arc::new(http)),
        })
    }

    fn api_base(&self) -> &str {
        self.upstream.api_base.trim_end_matches('/')
    }

    fn http(&self) -> Arc<HttpClient> {
        self.http
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Start a new cookie jar so cookies never carry over between runs
    fn reset_session(&self) -> Result<Arc<HttpClient>> {
        let fresh = Arc::new(HttpClient::new(&self.http_config)?);
        *self
            .http
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = fresh.clone();
        Ok(fresh)
    }

    fn authorized(token: &AuthToken) -> RequestOptions {
        RequestOptions::default().header("Authorization", token.authorization_header())
    }

    /// URL of the subscription listing
    pub fn subscriptions_url(&self) -> String {
        format!("{}/reader/api/0/subscription/list?output=json", self.api_base())
    }

    /// URL of a stream's recent items
    pub fn stream_url(&self, stream_id: &str) -> String {
        format!(
            "{}/reader/api/0/stream/contents/{}?n={}",
            self.api_base(),
            encode_component(stream_id),
            self.upstream.max_items_per_feed
        )
    }
}

#[async_trait::async_trait]
impl ReaderSource for ReaderClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken> {
        let http = if self.http_config.cookie_store {
            self.reset_session()?
        } else {
            self.http()
        };

        let options = RequestOptions::any_status()
            .header("User-Agent", self.upstream.user_agent.clone())
            .header("Accept", "text/plain");

        let response = http
            .get(&login_url(self.api_base(), credentials), &options)
            .await
            .map_err(|e| Error::Auth {
                reason: format!("login request failed: {}", e),
            })?;

        match extract_token(&response.body) {
            Some(token) => {
                debug!(status = response.status, "Obtained session token");
                Ok(token)
            }
            None => Err(Error::Auth {
                reason: format!("no auth token in login response (status {})", response.status),
            }),
        }
    }

    async fn list_subscriptions(&self, token: &AuthToken) -> Result<Vec<Subscription>> {
        let response = self
            .http()
            .get(&self.subscriptions_url(), &Self::authorized(token))
            .await?;

        Ok(parse_subscriptions(&response.body))
    }

    async fn fetch_articles(&self, token: &AuthToken, stream_id: &str) -> Result<Vec<RawArticle>> {
        let response = self
            .http()
            .get(&self.stream_url(stream_id), &Self::authorized(token))
            .await?;

        let mut articles = serde_json::from_str::<StreamContents>(&response.body)?.items;
        sort_newest_first(&mut articles);

        debug!(stream_id = %stream_id, count = articles.len(), "Fetched stream items");
        Ok(articles)
    }
}

/// Parse a subscription listing body
///
/// Non-JSON bodies and a missing or malformed `subscriptions` field give an
/// empty listing. Entries that are not objects are skipped.
pub fn parse_subscriptions(body: &str) -> Vec<Subscription> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Subscription listing is not JSON");
            return Vec::new();
        }
    };

    let Some(entries) = value.get("subscriptions").and_then(|v| v.as_array()) else {
        warn!("Subscription listing has no subscriptions array");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match Subscription::deserialize(entry) {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!(error = %e, "Skipping malformed subscription entry");
                None
            }
        })
        .collect()
}
