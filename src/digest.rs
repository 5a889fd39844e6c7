//! Per-site article digest and the merge policy across runs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;
use utoipa::ToSchema;

/// Maximum number of articles kept per site
pub const MAX_ITEMS_PER_SITE: usize = 10;

/// Display record for one article
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FormattedArticle {
    /// Title of the subscription the article came from
    pub site_name: String,

    /// Article title, `untitled` when missing
    pub title: String,

    /// Article URL, `#` when missing
    pub link: String,

    /// Publish time as `YYYY-MM-DD HH:MM`
    pub time: String,

    /// Plain-text summary, at most 99 characters plus `...`
    pub description: String,

    /// Site icon URL
    pub icon: String,

    /// Publish time in epoch seconds, used for ordering
    #[serde(skip)]
    pub published: i64,
}

/// Mapping of site name to its newest articles
///
/// Serializes as a plain JSON object keyed by site name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleDigest(BTreeMap<String, Vec<FormattedArticle>>);

impl ArticleDigest {
    /// Empty digest
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no site is present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Articles of one site
    pub fn site(&self, name: &str) -> Option<&[FormattedArticle]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Site names in order
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate sites with their articles
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FormattedArticle])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Total number of articles across sites
    pub fn article_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Append articles to their sites without ordering or truncating
    ///
    /// Several subscriptions may share a title; their articles accumulate under
    /// one site. [`merge`] restores the ordering and size bounds.
    pub fn extend(&mut self, articles: impl IntoIterator<Item = FormattedArticle>) {
        for article in articles {
            self.0
                .entry(article.site_name.clone())
                .or_default()
                .push(article);
        }
    }
}

impl FromIterator<FormattedArticle> for ArticleDigest {
    fn from_iter<I: IntoIterator<Item = FormattedArticle>>(iter: I) -> Self {
        let mut digest = Self::new();
        digest.extend(iter);
        digest
    }
}

/// Merge freshly fetched articles into the previous digest
///
/// Per site: fresh articles followed by cached ones, duplicates dropped (the
/// fresh copy wins), stable sort by descending publish time, keep
/// [`MAX_ITEMS_PER_SITE`]. Sites only present in `previous` are retained.
pub fn merge(previous: Option<&ArticleDigest>, fresh: ArticleDigest) -> ArticleDigest {
    let mut merged = previous.map(|p| p.0.clone()).unwrap_or_default();

    for (site, mut articles) in fresh.0 {
        if let Some(cached) = merged.remove(&site) {
            articles.extend(cached);
        }
        merged.insert(site, normalize(articles));
    }

    ArticleDigest(merged)
}

fn normalize(mut articles: Vec<FormattedArticle>) -> Vec<FormattedArticle> {
    // Same link, title and publish time is the same article seen again
    let mut seen = HashSet::new();
    articles.retain(|a| seen.insert((a.link.clone(), a.title.clone(), a.published)));

    articles.sort_by(|a, b| b.published.cmp(&a.published));
    articles.truncate(MAX_ITEMS_PER_SITE);
    articles
}
