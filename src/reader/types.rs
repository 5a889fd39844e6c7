//! Upstream reader API data shapes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session token obtained from the login endpoint
///
/// Lives for one pipeline run; never persisted or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw token value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value for authenticated calls
    pub fn authorization_header(&self) -> String {
        format!("GoogleLogin auth={}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// One subscribed feed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Opaque stream identifier (e.g. "feed/https://example.com/rss")
    #[serde(default)]
    pub id: String,

    /// Feed title as shown to the user
    #[serde(default)]
    pub title: String,

    /// Upstream icon URL
    #[serde(default, rename = "iconUrl")]
    pub icon_url: String,
}

/// Summary block of a stream item
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// HTML content
    #[serde(default)]
    pub content: Option<String>,
}

/// Link entry of a stream item
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Target URL
    #[serde(default)]
    pub href: Option<String>,
}

/// Article as returned by the stream contents endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArticle {
    /// Article title
    #[serde(default)]
    pub title: Option<String>,

    /// HTML summary
    #[serde(default)]
    pub summary: Option<Summary>,

    /// Alternate links, the first one is the article page
    #[serde(default)]
    pub alternate: Vec<Link>,

    /// Publish time in epoch seconds
    #[serde(default)]
    pub published: i64,
}

impl RawArticle {
    /// First alternate link, if any
    pub fn link(&self) -> Option<&str> {
        self.alternate
            .iter()
            .filter_map(|l| l.href.as_deref())
            .find(|href| !href.trim().is_empty())
    }

    /// Summary HTML, if any
    pub fn summary_html(&self) -> Option<&str> {
        self.summary.as_ref().and_then(|s| s.content.as_deref())
    }
}

/// Sort articles newest first, keeping response order for equal timestamps
pub fn sort_newest_first(articles: &mut [RawArticle]) {
    // slice::sort_by is stable
    articles.sort_by(|a, b| b.published.cmp(&a.published));
}
