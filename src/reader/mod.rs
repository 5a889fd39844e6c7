//! Google-Reader-compatible upstream API
//!
//! [`ReaderSource`] is the seam the digest pipeline depends on. The production
//! implementation is [`ReaderClient`], which talks HTTP through
//! [`crate::http::HttpClient`]; tests substitute in-memory sources.

pub mod auth;
pub mod client;
pub mod types;

pub use client::ReaderClient;
pub use types::{AuthToken, Link, RawArticle, Subscription, Summary};

use crate::config::Credentials;
use crate::error::Result;

/// Abstraction over the upstream reader API, enabling testability.
#[async_trait::async_trait]
pub trait ReaderSource: Send + Sync {
    /// Obtain a session token
    ///
    /// # Errors
    /// Returns [`crate::Error::Auth`] when no token can be obtained
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken>;

    /// List the user's subscriptions
    ///
    /// A malformed listing yields an empty sequence rather than an error.
    ///
    /// # Errors
    /// Returns error if the request fails after retries
    async fn list_subscriptions(&self, token: &AuthToken) -> Result<Vec<Subscription>>;

    /// Fetch recent items of one stream, newest first
    ///
    /// # Errors
    /// Returns error if the request fails after retries or the body is not a
    /// stream document
    async fn fetch_articles(&self, token: &AuthToken, stream_id: &str) -> Result<Vec<RawArticle>>;
}
