//! Digest pipeline: cache gate, login, listing, batched fetching and merge
//!
//! Stages of one request:
//! 1. Check the cache gate and return the cached digest when allowed
//! 2. Take the refresh lock and re-check the gate
//! 3. Log in and list subscriptions (failures here abort the run)
//! 4. Fetch subscriptions in fixed-size groups within the time budget
//! 5. Merge with the previous digest and commit it to the cache
//!
//! A failed run falls back to the previous digest when one exists.

use crate::cache::DigestCache;
use crate::config::{BatchConfig, Config, Credentials};
use crate::digest::{ArticleDigest, FormattedArticle, merge};
use crate::error::{Error, Result};
use crate::format::ArticleFormatter;
use crate::reader::{AuthToken, ReaderClient, ReaderSource, Subscription};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Where a served digest came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestSource {
    /// Produced by a pipeline run for this request
    Fresh,
    /// Served by the cache gate without contacting upstream
    Cache,
    /// Previous digest served because the run failed
    Stale,
}

impl DigestSource {
    /// Header value for this source
    pub fn as_str(self) -> &'static str {
        match self {
            DigestSource::Fresh => "fresh",
            DigestSource::Cache => "cache",
            DigestSource::Stale => "stale",
        }
    }
}

impl fmt::Display for DigestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A digest together with how it was obtained
#[derive(Clone, Debug)]
pub struct DigestResponse {
    /// The digest (shared with the cache)
    pub digest: Arc<ArticleDigest>,
    /// Where it came from
    pub source: DigestSource,
    /// Summary of the run, present for fresh digests
    pub report: Option<RunReport>,
}

/// Pipeline stage, logged on every transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    /// Consulting the cache gate
    CheckCache,
    /// Obtaining a session token
    Authenticating,
    /// Listing subscriptions
    Listing,
    /// Fetching group `group` of `groups` (1-based)
    Batching {
        /// Current group
        group: usize,
        /// Total groups
        groups: usize,
    },
    /// Merging with the previous digest
    Merging,
    /// Digest committed or stale digest served
    Cached,
    /// Run failed with no digest to fall back on
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::CheckCache => f.write_str("check_cache"),
            PipelineStage::Authenticating => f.write_str("authenticating"),
            PipelineStage::Listing => f.write_str("listing"),
            PipelineStage::Batching { group, groups } => write!(f, "batching {}/{}", group, groups),
            PipelineStage::Merging => f.write_str("merging"),
            PipelineStage::Cached => f.write_str("cached"),
            PipelineStage::Failed => f.write_str("failed"),
        }
    }
}

fn enter(stage: PipelineStage) {
    debug!(stage = %stage, "Pipeline stage");
}

/// Result of fetching one subscription
#[derive(Debug)]
pub enum SubscriptionOutcome {
    /// Articles fetched and formatted
    Fetched {
        /// Stream identifier
        stream_id: String,
        /// Formatted articles, newest first
        articles: Vec<FormattedArticle>,
    },
    /// Fetch failed after retries; the subscription contributes nothing
    Failed {
        /// Stream identifier
        stream_id: String,
        /// Last error
        error: Error,
    },
}

/// Summary of one pipeline run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Subscriptions in the listing
    pub subscriptions: usize,
    /// Subscriptions whose fetch was attempted
    pub attempted: usize,
    /// Subscriptions fetched successfully
    pub succeeded: usize,
    /// Subscriptions whose fetch failed
    pub failed: usize,
    /// Groups launched
    pub groups_run: usize,
    /// Groups in the run
    pub groups_total: usize,
    /// Whether the time budget stopped the run early
    pub budget_exceeded: bool,
    /// Wall-clock time spent batching
    pub elapsed: Duration,
}

/// Serves digests through the cache, refreshing from upstream when needed
pub struct DigestService {
    source: Arc<dyn ReaderSource>,
    credentials: Credentials,
    formatter: ArticleFormatter,
    batch: BatchConfig,
    cache: DigestCache,
}

impl DigestService {
    /// Create a service over an arbitrary reader source
    ///
    /// # Errors
    /// Returns error if the format configuration is invalid
    pub fn new(config: &Config, source: Arc<dyn ReaderSource>) -> Result<Self> {
        Ok(Self {
            source,
            credentials: config.credentials.clone(),
            formatter: ArticleFormatter::new(&config.format)?,
            batch: config.batch.clone(),
            cache: DigestCache::new(config.cache.clone()),
        })
    }

    /// Create a service talking to the configured upstream over HTTP
    ///
    /// # Errors
    /// Returns error if the HTTP client or formatter cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ReaderClient::new(config.upstream.clone(), config.http.clone())?;
        Self::new(config, Arc::new(client))
    }

    /// The digest cache
    pub fn cache(&self) -> &DigestCache {
        &self.cache
    }

    /// Current digest, refreshed from upstream when the cache gate allows
    ///
    /// # Errors
    /// Returns the run's error when it fails and no previous digest exists
    pub async fn get_digest(&self) -> Result<DigestResponse> {
        enter(PipelineStage::CheckCache);
        if let Some(digest) = self.cache.servable().await {
            debug!(sites = digest.len(), "Serving cached digest");
            return Ok(Self::cached(digest));
        }

        let _refresh = self.cache.lock_refresh().await;

        // Another request may have refreshed while we waited
        if let Some(digest) = self.cache.servable().await {
            debug!(sites = digest.len(), "Serving digest refreshed by concurrent request");
            return Ok(Self::cached(digest));
        }

        info!("Refreshing digest from upstream");
        match self.run().await {
            Ok((fresh, report)) => {
                enter(PipelineStage::Merging);
                let previous = self.cache.snapshot().await;
                let merged = merge(previous.as_ref().map(|entry| entry.digest.as_ref()), fresh);

                enter(PipelineStage::Cached);
                let digest = self.cache.commit(merged).await;
                info!(
                    sites = digest.len(),
                    articles = digest.article_count(),
                    succeeded = report.succeeded,
                    failed = report.failed,
                    budget_exceeded = report.budget_exceeded,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Digest refreshed"
                );

                Ok(DigestResponse {
                    digest,
                    source: DigestSource::Fresh,
                    report: Some(report),
                })
            }
            Err(e) => match self.cache.snapshot().await {
                Some(entry) => {
                    enter(PipelineStage::Cached);
                    warn!(
                        error = %e,
                        run_terminal = e.is_run_terminal(),
                        "Digest refresh failed, serving previous digest"
                    );
                    Ok(DigestResponse {
                        digest: entry.digest.clone(),
                        source: DigestSource::Stale,
                        report: None,
                    })
                }
                None => {
                    enter(PipelineStage::Failed);
                    error!(error = %e, "Digest refresh failed with no cached digest");
                    Err(e)
                }
            },
        }
    }

    fn cached(digest: Arc<ArticleDigest>) -> DigestResponse {
        DigestResponse {
            digest,
            source: DigestSource::Cache,
            report: None,
        }
    }

    /// One pipeline run without touching the cache
    async fn run(&self) -> Result<(ArticleDigest, RunReport)> {
        enter(PipelineStage::Authenticating);
        let token = self.source.login(&self.credentials).await?;

        enter(PipelineStage::Listing);
        let subscriptions = self.source.list_subscriptions(&token).await?;
        if subscriptions.is_empty() {
            return Err(Error::EmptyListing);
        }
        info!(subscriptions = subscriptions.len(), "Listed subscriptions");

        let (digest, report) = self.fetch_groups(&token, &subscriptions).await;

        if report.attempted > 0 && report.succeeded == 0 {
            return Err(Error::AllSubscriptionsFailed {
                attempted: report.attempted,
            });
        }

        Ok((digest, report))
    }

    /// Fetch subscriptions group by group within the time budget
    async fn fetch_groups(
        &self,
        token: &AuthToken,
        subscriptions: &[Subscription],
    ) -> (ArticleDigest, RunReport) {
        let started = Instant::now();
        let groups: Vec<&[Subscription]> = subscriptions.chunks(self.batch.group_size.max(1)).collect();

        let mut digest = ArticleDigest::new();
        let mut report = RunReport {
            subscriptions: subscriptions.len(),
            groups_total: groups.len(),
            ..RunReport::default()
        };

        for (index, group) in groups.iter().enumerate() {
            if index > 0 {
                if self.over_budget(started) {
                    report.budget_exceeded = true;
                    break;
                }
                tokio::time::sleep(self.batch.pause).await;
                if self.over_budget(started) {
                    report.budget_exceeded = true;
                    break;
                }
            }

            enter(PipelineStage::Batching {
                group: index + 1,
                groups: groups.len(),
            });

            for outcome in self.fetch_group(token, group).await {
                report.attempted += 1;
                match outcome {
                    SubscriptionOutcome::Fetched { articles, .. } => {
                        report.succeeded += 1;
                        digest.extend(articles);
                    }
                    SubscriptionOutcome::Failed { .. } => report.failed += 1,
                }
            }
            report.groups_run += 1;
        }

        report.elapsed = started.elapsed();
        if report.budget_exceeded {
            warn!(
                groups_run = report.groups_run,
                groups_total = report.groups_total,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Time budget exhausted, skipping remaining subscriptions"
            );
        }

        (digest, report)
    }

    fn over_budget(&self, started: Instant) -> bool {
        started.elapsed() >= self.batch.time_budget
    }

    /// Fetch one group; outcomes come back in subscription order
    async fn fetch_group(&self, token: &AuthToken, group: &[Subscription]) -> Vec<SubscriptionOutcome> {
        let concurrency = if self.batch.concurrent { group.len().max(1) } else { 1 };

        // Built up front so the stream holds plain futures, not a borrowing closure
        let fetches: Vec<_> = group
            .iter()
            .map(|subscription| self.fetch_one(token, subscription))
            .collect();

        stream::iter(fetches)
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn fetch_one(&self, token: &AuthToken, subscription: &Subscription) -> SubscriptionOutcome {
        match self.source.fetch_articles(token, &subscription.id).await {
            Ok(raw) => SubscriptionOutcome::Fetched {
                stream_id: subscription.id.clone(),
                articles: self.formatter.format(&raw, subscription),
            },
            Err(e) => {
                warn!(
                    stream_id = %subscription.id,
                    error = %e,
                    "Failed to fetch subscription, skipping"
                );
                SubscriptionOutcome::Failed {
                    stream_id: subscription.id.clone(),
                    error: e,
                }
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
