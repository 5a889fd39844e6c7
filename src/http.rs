//! Outbound HTTP client shared by every call to the reader API
//!
//! One [`HttpClient`] wraps a `reqwest::Client` with the per-attempt timeout
//! and the retry policy from [`HttpConfig`]. Callers choose whether a non-2xx
//! status is a failure ([`StatusMode::RequireSuccess`]) or just data
//! ([`StatusMode::AnyStatus`]).

use crate::config::{HttpConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use std::time::Duration;

/// How a response status is interpreted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusMode {
    /// Non-2xx responses become [`Error::HttpStatus`]
    #[default]
    RequireSuccess,
    /// Any status is returned to the caller together with its body
    AnyStatus,
}

/// Per-request options
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Extra request headers
    pub headers: Vec<(&'static str, String)>,
    /// Status interpretation
    pub mode: StatusMode,
}

impl RequestOptions {
    /// Options for a request whose body is inspected regardless of status
    pub fn any_status() -> Self {
        Self {
            mode: StatusMode::AnyStatus,
            ..Self::default()
        }
    }

    /// Add a header
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// A fully read response
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Body decoded as text
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client with timeout and retry
pub struct HttpClient {
    client: reqwest::Client,
    request_timeout: Duration,
    retry: RetryConfig,
}

impl HttpClient {
    /// Create a client from configuration
    ///
    /// No default `User-Agent` is installed; callers send exactly the headers
    /// they pass in [`RequestOptions`].
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(config.cookie_store)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            retry: config.retry.clone(),
        })
    }

    /// GET `url`, retrying transient failures
    pub async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
        with_retry(&self.retry, || self.get_once(url, options)).await
    }

    /// A single attempt bounded by the request timeout
    async fn get_once(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            request = request.header(*name, value.as_str());
        }

        // reqwest errors embed the full URL; the login query carries the password
        let attempt = async {
            let response = request.send().await.map_err(|e| e.without_url())?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| e.without_url())?;
            Ok::<_, Error>(HttpResponse { status, body })
        };

        let response = tokio::time::timeout(self.request_timeout, attempt)
            .await
            .map_err(|_| Error::Timeout {
                url: display_url(url),
            })??;

        if options.mode == StatusMode::RequireSuccess && !response.is_success() {
            return Err(Error::HttpStatus {
                status: response.status,
                url: display_url(url),
            });
        }

        Ok(response)
    }
}

/// URL without its query string, safe for logs and error messages
///
/// The login URL carries the password in its query.
pub fn display_url(url: &str) -> String {
    url.split(['?', '#']).next().unwrap_or(url).to_string()
}
