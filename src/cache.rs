//! Process-lifetime digest cache
//!
//! Holds at most one [`CacheEntry`]. Entries are immutable and replaced as a
//! whole, so readers clone an `Arc` and never see a half-merged digest.
//!
//! An entry is served without contacting upstream while it is either unexpired
//! (`now < expire_at`) or was refreshed within the cooldown window.

use crate::config::CacheConfig;
use crate::digest::ArticleDigest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;

/// One cached digest with its timing metadata
#[derive(Debug)]
pub struct CacheEntry {
    /// The digest of the last successful run
    pub digest: Arc<ArticleDigest>,
    /// When the entry stops being served from the TTL alone
    pub expire_at: Instant,
    /// When the entry was committed
    pub last_refreshed_at: Instant,
}

impl CacheEntry {
    /// Whether the entry may be served at `now` without refreshing
    pub fn is_servable(&self, now: Instant, cooldown: Duration) -> bool {
        now < self.expire_at || now.saturating_duration_since(self.last_refreshed_at) < cooldown
    }

    /// Time since the entry was committed
    pub fn age(&self) -> Duration {
        self.last_refreshed_at.elapsed()
    }
}

/// Single-slot digest cache
#[derive(Debug)]
pub struct DigestCache {
    config: CacheConfig,
    entry: RwLock<Option<Arc<CacheEntry>>>,
    /// Serializes refreshes so a burst on a cold cache fetches once
    refresh: Mutex<()>,
}

impl DigestCache {
    /// Create an empty cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entry: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Current entry, servable or not
    pub async fn snapshot(&self) -> Option<Arc<CacheEntry>> {
        self.entry.read().await.clone()
    }

    /// Current digest if the gate allows serving it without a refresh
    pub async fn servable(&self) -> Option<Arc<ArticleDigest>> {
        let entry = self.snapshot().await?;
        if entry.is_servable(Instant::now(), self.config.cooldown) {
            Some(entry.digest.clone())
        } else {
            None
        }
    }

    /// Replace the entry with `digest`, stamping it with the current time
    pub async fn commit(&self, digest: ArticleDigest) -> Arc<ArticleDigest> {
        let now = Instant::now();
        let digest = Arc::new(digest);
        let entry = Arc::new(CacheEntry {
            digest: digest.clone(),
            expire_at: now + self.config.ttl,
            last_refreshed_at: now,
        });

        *self.entry.write().await = Some(entry);
        tracing::debug!(
            sites = digest.len(),
            ttl_secs = self.config.ttl.as_secs(),
            "Digest cache updated"
        );
        digest
    }

    /// Wait for exclusive refresh rights
    pub async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }
}
