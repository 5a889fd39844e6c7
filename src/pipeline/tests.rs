//! Tests for the digest pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::{BatchConfig, CacheConfig, Config, Credentials};
use crate::digest::MAX_ITEMS_PER_SITE;
use crate::error::{Error, Result};
use crate::reader::{AuthToken, Link, RawArticle, ReaderSource, Subscription};

use super::{DigestService, DigestSource};

/// In-memory reader that counts every call
#[derive(Default)]
struct CountingSource {
    subscriptions: Mutex<Vec<Subscription>>,
    articles: Mutex<HashMap<String, Vec<RawArticle>>>,
    failing_streams: Mutex<HashSet<String>>,
    fail_login: AtomicBool,
    fetch_delay: Mutex<Duration>,
    logins: AtomicUsize,
    listings: AtomicUsize,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CountingSource {
    fn with_sites(sites: &[(&str, usize)]) -> Arc<Self> {
        let source = Self::default();
        for (site, count) in sites {
            source.add_site(site, *count);
        }
        Arc::new(source)
    }

    fn add_site(&self, site: &str, count: usize) {
        let id = format!("feed/{site}");
        self.subscriptions.lock().unwrap().push(Subscription {
            id: id.clone(),
            title: site.to_string(),
            icon_url: format!("https://reader.example/icons/{site}.png"),
        });
        let articles = (0..count)
            .map(|i| RawArticle {
                title: Some(format!("{site}-{i}")),
                summary: None,
                alternate: vec![Link {
                    href: Some(format!("https://{site}.example/{i}")),
                }],
                published: 1_000 + i as i64,
            })
            .collect();
        self.articles.lock().unwrap().insert(id, articles);
    }

    fn fail_stream(&self, site: &str) {
        self.failing_streams
            .lock()
            .unwrap()
            .insert(format!("feed/{site}"));
    }

    fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReaderSource for CountingSource {
    async fn login(&self, _credentials: &Credentials) -> Result<AuthToken> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(Error::Auth {
                reason: "no auth token in login response (status 403)".to_string(),
            });
        }
        Ok(AuthToken::new("test-token"))
    }

    async fn list_subscriptions(&self, _token: &AuthToken) -> Result<Vec<Subscription>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.subscriptions.lock().unwrap().clone())
    }

    async fn fetch_articles(&self, _token: &AuthToken, stream_id: &str) -> Result<Vec<RawArticle>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_streams.lock().unwrap().contains(stream_id) {
            return Err(Error::HttpStatus {
                status: 503,
                url: format!("https://reader.example/reader/api/0/stream/contents/{stream_id}"),
            });
        }

        let mut articles = self
            .articles
            .lock()
            .unwrap()
            .get(stream_id)
            .cloned()
            .unwrap_or_default();
        articles.sort_by(|a, b| b.published.cmp(&a.published));
        Ok(articles)
    }
}

fn test_config(batch: BatchConfig) -> Config {
    Config {
        credentials: Credentials::new("me@example.com", "secret"),
        cache: CacheConfig {
            ttl: Duration::from_secs(300),
            cooldown: Duration::from_secs(30),
        },
        batch,
        ..Config::default()
    }
}

fn default_batch() -> BatchConfig {
    BatchConfig {
        group_size: 5,
        pause: Duration::from_millis(100),
        concurrent: true,
        time_budget: Duration::from_secs(60),
    }
}

fn service(source: &Arc<CountingSource>, batch: BatchConfig) -> DigestService {
    DigestService::new(&test_config(batch), source.clone()).unwrap()
}

/// Move past both the TTL and the cooldown
async fn expire_cache() {
    tokio::time::advance(Duration::from_secs(301)).await;
}

// -----------------------------------------------------------------------
// Cache gate
// -----------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cold_cache_runs_pipeline_and_commits() {
    let source = CountingSource::with_sites(&[("alpha", 3), ("beta", 2)]);
    let service = service(&source, default_batch());

    let response = service.get_digest().await.unwrap();

    assert_eq!(response.source, DigestSource::Fresh);
    assert_eq!(response.digest.len(), 2);
    assert_eq!(response.digest.site("alpha").unwrap().len(), 3);
    assert_eq!(source.logins(), 1);

    let report = response.report.unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 2);
    assert!(!report.budget_exceeded);
}

#[tokio::test(start_paused = true)]
async fn request_within_cooldown_returns_same_digest_without_upstream_calls() {
    let source = CountingSource::with_sites(&[("alpha", 3)]);
    let service = DigestService::new(
        &Config {
            cache: CacheConfig {
                ttl: Duration::ZERO,
                cooldown: Duration::from_secs(30),
            },
            ..test_config(default_batch())
        },
        source.clone(),
    )
    .unwrap();

    let first = service.get_digest().await.unwrap();
    tokio::time::advance(Duration::from_secs(10)).await;
    let second = service.get_digest().await.unwrap();

    assert_eq!(second.source, DigestSource::Cache);
    assert!(Arc::ptr_eq(&first.digest, &second.digest));
    assert_eq!(source.logins(), 1);
    assert_eq!(source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_cache_triggers_refresh() {
    let source = CountingSource::with_sites(&[("alpha", 3)]);
    let service = service(&source, default_batch());

    service.get_digest().await.unwrap();
    expire_cache().await;
    let response = service.get_digest().await.unwrap();

    assert_eq!(response.source, DigestSource::Fresh);
    assert_eq!(source.logins(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_on_cold_cache_refresh_once() {
    let source = CountingSource::with_sites(&[("alpha", 3), ("beta", 3)]);
    *source.fetch_delay.lock().unwrap() = Duration::from_millis(200);
    let service = service(&source, default_batch());

    let responses = futures::future::join_all((0..5).map(|_| service.get_digest())).await;

    assert_eq!(source.logins(), 1);
    let fresh = responses
        .iter()
        .filter(|r| r.as_ref().unwrap().source == DigestSource::Fresh)
        .count();
    assert_eq!(fresh, 1);

    let first = &responses[0].as_ref().unwrap().digest;
    for response in &responses {
        assert!(Arc::ptr_eq(first, &response.as_ref().unwrap().digest));
    }
}

// -----------------------------------------------------------------------
// Failure handling
// -----------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failing_subscription_is_skipped() {
    let source = CountingSource::with_sites(&[("one", 2), ("two", 2), ("three", 2)]);
    source.fail_stream("two");
    let service = service(&source, default_batch());

    let response = service.get_digest().await.unwrap();

    let sites: Vec<_> = response.digest.sites().collect();
    assert_eq!(sites, vec!["one", "three"]);
    let report = response.report.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 2);
}

#[tokio::test(start_paused = true)]
async fn auth_failure_with_warm_cache_serves_previous_digest() {
    let source = CountingSource::with_sites(&[("alpha", 3)]);
    let service = service(&source, default_batch());

    let first = service.get_digest().await.unwrap();
    expire_cache().await;
    source.fail_login.store(true, Ordering::SeqCst);

    let second = service.get_digest().await.unwrap();

    assert_eq!(second.source, DigestSource::Stale);
    assert!(Arc::ptr_eq(&first.digest, &second.digest));
    assert_eq!(source.fetches(), 1, "no fetch after failed login");
}

#[tokio::test(start_paused = true)]
async fn auth_failure_with_cold_cache_is_terminal() {
    let source = CountingSource::with_sites(&[("alpha", 3)]);
    source.fail_login.store(true, Ordering::SeqCst);
    let service = service(&source, default_batch());

    let err = service.get_digest().await.unwrap_err();

    assert!(matches!(err, Error::Auth { .. }));
    assert_eq!(source.listings.load(Ordering::SeqCst), 0);
    assert!(service.cache().snapshot().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn empty_listing_is_terminal_on_cold_cache() {
    let source = CountingSource::with_sites(&[]);
    let service = service(&source, default_batch());

    let err = service.get_digest().await.unwrap_err();
    assert!(matches!(err, Error::EmptyListing));
}

#[tokio::test(start_paused = true)]
async fn all_subscriptions_failing_counts_as_failed_run() {
    let source = CountingSource::with_sites(&[("one", 1), ("two", 1)]);
    source.fail_stream("one");
    source.fail_stream("two");
    let service = service(&source, default_batch());

    let err = service.get_digest().await.unwrap_err();
    assert!(matches!(err, Error::AllSubscriptionsFailed { attempted: 2 }));
    assert!(service.cache().snapshot().await.is_none());
}

// -----------------------------------------------------------------------
// Merge across runs
// -----------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn sites_never_exceed_ten_newest_first() {
    let source = CountingSource::with_sites(&[("busy", 25), ("quiet", 4)]);
    let service = service(&source, default_batch());

    let response = service.get_digest().await.unwrap();

    for (_, articles) in response.digest.iter() {
        assert!(articles.len() <= MAX_ITEMS_PER_SITE);
        assert!(articles.windows(2).all(|w| w[0].published >= w[1].published));
    }
    let busy = response.digest.site("busy").unwrap();
    assert_eq!(busy[0].title, "busy-24");
}

#[tokio::test(start_paused = true)]
async fn repeated_runs_with_same_data_are_idempotent() {
    let source = CountingSource::with_sites(&[("alpha", 15), ("beta", 3)]);
    let service = service(&source, default_batch());

    let first = service.get_digest().await.unwrap();
    expire_cache().await;
    let second = service.get_digest().await.unwrap();

    assert_eq!(second.source, DigestSource::Fresh);
    assert_eq!(*first.digest, *second.digest);
}

#[tokio::test(start_paused = true)]
async fn sites_missing_from_later_run_are_retained() {
    let source = CountingSource::with_sites(&[("alpha", 2), ("beta", 2)]);
    let service = service(&source, default_batch());

    service.get_digest().await.unwrap();
    expire_cache().await;
    source.fail_stream("beta");
    let response = service.get_digest().await.unwrap();

    assert_eq!(response.source, DigestSource::Fresh);
    assert_eq!(response.digest.site("beta").unwrap().len(), 2);
}

// -----------------------------------------------------------------------
// Batching
// -----------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn groups_are_separated_by_pause() {
    let source = CountingSource::with_sites(&[("a", 1), ("b", 1), ("c", 1)]);
    let service = service(
        &source,
        BatchConfig {
            group_size: 1,
            pause: Duration::from_secs(1),
            ..default_batch()
        },
    );

    let report = service.get_digest().await.unwrap().report.unwrap();

    assert_eq!(report.groups_total, 3);
    assert_eq!(report.groups_run, 3);
    assert!(report.elapsed >= Duration::from_secs(2));
    assert!(report.elapsed < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn time_budget_stops_further_groups() {
    let source = CountingSource::with_sites(&[("a", 1), ("b", 1), ("c", 1), ("d", 1), ("e", 1)]);
    let service = service(
        &source,
        BatchConfig {
            group_size: 1,
            pause: Duration::from_secs(1),
            concurrent: true,
            time_budget: Duration::from_millis(1500),
        },
    );

    let response = service.get_digest().await.unwrap();
    let report = response.report.unwrap();

    assert!(report.budget_exceeded);
    assert_eq!(report.groups_run, 2);
    assert_eq!(source.fetches(), 2);
    assert_eq!(response.digest.len(), 2, "partial digest is still committed");
    assert!(service.cache().snapshot().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn first_group_runs_even_with_zero_budget() {
    let source = CountingSource::with_sites(&[("a", 1), ("b", 1), ("c", 1)]);
    let service = service(
        &source,
        BatchConfig {
            group_size: 2,
            time_budget: Duration::ZERO,
            ..default_batch()
        },
    );

    let report = service.get_digest().await.unwrap().report.unwrap();
    assert_eq!(report.groups_run, 1);
    assert_eq!(report.attempted, 2);
}

#[tokio::test(start_paused = true)]
async fn group_members_run_concurrently() {
    let source = CountingSource::with_sites(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)]);
    *source.fetch_delay.lock().unwrap() = Duration::from_millis(50);
    let service = service(
        &source,
        BatchConfig {
            group_size: 3,
            ..default_batch()
        },
    );

    service.get_digest().await.unwrap();
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn sequential_mode_fetches_one_at_a_time_in_order() {
    let source = CountingSource::with_sites(&[("a", 1), ("b", 1), ("c", 1)]);
    *source.fetch_delay.lock().unwrap() = Duration::from_millis(50);
    let service = service(
        &source,
        BatchConfig {
            group_size: 3,
            concurrent: false,
            ..default_batch()
        },
    );

    let response = service.get_digest().await.unwrap();
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(response.digest.len(), 3);
}
