//! Article formatting
//!
//! Turns upstream [`RawArticle`]s into compact [`FormattedArticle`] display
//! records. Everything here is pure: no I/O and no clock.

use crate::config::{FormatConfig, env_keys};
use crate::digest::FormattedArticle;
use crate::error::{Error, Result};
use crate::reader::{RawArticle, Subscription};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use std::sync::LazyLock;

/// Descriptions longer than this many characters are truncated
pub const MAX_DESCRIPTION_CHARS: usize = 100;

/// Characters kept from a truncated description before the ellipsis
const TRUNCATED_PREFIX_CHARS: usize = MAX_DESCRIPTION_CHARS - 1;

/// Display format of the publish time
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Placeholder for a missing article title
pub const UNTITLED: &str = "untitled";

/// Placeholder for a missing article link
pub const NO_LINK: &str = "#";

/// Placeholder for a missing subscription title
pub const UNKNOWN_SITE: &str = "unknown site";

/// Tags that survive the first pass, typically decoded from `&lt;...&gt;`
static LEFTOVER_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").ok());

/// Formats raw articles for one configuration
#[derive(Clone, Debug)]
pub struct ArticleFormatter {
    icon_base_url: String,
    offset: FixedOffset,
}

impl ArticleFormatter {
    /// Create a formatter
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the UTC offset is out of range
    pub fn new(config: &FormatConfig) -> Result<Self> {
        let offset = config
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                Error::config(
                    env_keys::TIME_OFFSET_MINUTES,
                    format!("UTC offset out of range: {} minutes", config.utc_offset_minutes),
                )
            })?;

        Ok(Self {
            icon_base_url: config.icon_base_url.trim_end_matches('/').to_string(),
            offset,
        })
    }

    /// Format every article of one subscription, preserving order
    pub fn format(&self, articles: &[RawArticle], subscription: &Subscription) -> Vec<FormattedArticle> {
        let site_name = non_blank(&subscription.title).unwrap_or(UNKNOWN_SITE);
        let icon = icon_url(&self.icon_base_url, &subscription.icon_url);

        articles
            .iter()
            .map(|article| FormattedArticle {
                site_name: site_name.to_string(),
                title: article
                    .title
                    .as_deref()
                    .and_then(non_blank)
                    .unwrap_or(UNTITLED)
                    .to_string(),
                link: article.link().unwrap_or(NO_LINK).to_string(),
                time: format_time(article.published, &self.offset),
                description: article
                    .summary_html()
                    .map(|html| truncate_description(&clean_text(html)))
                    .unwrap_or_default(),
                icon: icon.clone(),
                published: article.published,
            })
            .collect()
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Local icon URL built from the last path segment of the upstream one
///
/// Query and fragment are ignored. An empty segment gives an empty string.
pub fn icon_url(base: &str, upstream: &str) -> String {
    let segment = match url::Url::parse(upstream) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or_default()
            .to_string(),
        Err(_) => upstream
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default()
            .to_string(),
    };

    if segment.is_empty() {
        String::new()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), segment)
    }
}

/// Render an epoch timestamp at a fixed offset
///
/// Timestamps chrono cannot represent render as the empty string.
pub fn format_time(published: i64, offset: &FixedOffset) -> String {
    DateTime::from_timestamp(published, 0)
        .map(|utc| utc.with_timezone(offset).format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// Keep at most [`MAX_DESCRIPTION_CHARS`] characters
///
/// Longer text keeps its first 99 characters followed by `...`.
pub fn truncate_description(text: &str) -> String {
    if text.chars().count() <= MAX_DESCRIPTION_CHARS {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(TRUNCATED_PREFIX_CHARS).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Plain text from an HTML fragment
///
/// Tags are stripped, entities decoded, any markup produced by decoding is
/// stripped again and whitespace is collapsed.
pub fn clean_text(html: &str) -> String {
    let decoded = html_escape::decode_html_entities(&strip_tags(html)).into_owned();
    let stripped = match LEFTOVER_TAG.as_ref() {
        Some(re) => re.replace_all(&decoded, " ").into_owned(),
        None => strip_tags(&decoded),
    };

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `<...>` tags
///
/// A `<` only opens a tag when followed by a letter, `/`, `!` or `?`, so
/// comparisons like `a < b` survive. A tag still open at the end of the input
/// was never a tag and is kept as text.
fn strip_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut pending: Option<String> = None;
    let mut chars = html.chars().peekable();

    while let Some(ch) = chars.next() {
        match pending.as_mut() {
            Some(_) if ch == '>' => {
                pending = None;
                // Block boundaries separate words
                result.push(' ');
            }
            Some(tag) => tag.push(ch),
            None if ch == '<' => {
                let opens = chars
                    .peek()
                    .is_some_and(|next| next.is_ascii_alphabetic() || matches!(*next, '/' | '!' | '?'));
                if opens {
                    pending = Some(String::from(ch));
                } else {
                    result.push(ch);
                }
            }
            None => result.push(ch),
        }
    }

    if let Some(unclosed) = pending {
        result.push_str(&unclosed);
    }

    result
}
