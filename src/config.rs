//! Configuration types for reader-digest
//!
//! Every recognized option is sourced from the environment. Defaults are
//! chosen so a run over a few dozen subscriptions finishes well inside a
//! typical ten second serverless execution limit.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

/// Login credentials for the upstream reader account
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Account e-mail / username
    pub username: String,

    /// Account password (never serialized)
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Upstream reader API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API base URL, without trailing slash (default: "https://www.inoreader.com")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Client identifier sent on login and data requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Items requested per subscription stream (default: 100)
    #[serde(default = "default_max_items_per_feed")]
    pub max_items_per_feed: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            max_items_per_feed: default_max_items_per_feed(),
        }
    }
}

/// Retry configuration for transient request failures
///
/// The delay before retry `n` (1-based) is `base_delay * n`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 2, i.e. 3 attempts total)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay multiplied by the retry number (default: 500ms)
    #[serde(default = "default_retry_base_delay", with = "duration_millis")]
    pub base_delay: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_retry_base_delay(),
            jitter: false,
        }
    }
}

/// Outbound HTTP client settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-attempt timeout (default: 5000ms)
    #[serde(default = "default_request_timeout", with = "duration_millis")]
    pub request_timeout: Duration,

    /// Retry policy shared by every outbound call
    #[serde(default)]
    pub retry: RetryConfig,

    /// Keep cookies between the requests of one run (default: false)
    #[serde(default)]
    pub cookie_store: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            retry: RetryConfig::default(),
            cookie_store: false,
        }
    }
}

/// Digest cache freshness windows
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Hard time-to-live of a committed digest (default: 300s)
    #[serde(default = "default_cache_ttl", with = "duration_secs")]
    pub ttl: Duration,

    /// Cooldown after a successful refresh during which no new run starts (default: 30s)
    #[serde(default = "default_cache_cooldown", with = "duration_secs")]
    pub cooldown: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            cooldown: default_cache_cooldown(),
        }
    }
}

/// Batch orchestration settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Subscriptions per group (default: 5)
    #[serde(default = "default_group_size")]
    pub group_size: usize,

    /// Pause between groups (default: 1000ms)
    #[serde(default = "default_batch_pause", with = "duration_millis")]
    pub pause: Duration,

    /// Fetch the subscriptions of a group concurrently (default: true)
    #[serde(default = "default_true")]
    pub concurrent: bool,

    /// Soft wall-clock budget for one run (default: 8000ms)
    #[serde(default = "default_time_budget", with = "duration_millis")]
    pub time_budget: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            pause: default_batch_pause(),
            concurrent: true,
            time_budget: default_time_budget(),
        }
    }
}

/// Article formatting settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Base under which subscription icons are served (default: "/icons")
    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,

    /// Fixed UTC offset, in minutes, used to render article times (default: 0)
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            icon_base_url: default_icon_base_url(),
            utc_offset_minutes: 0,
        }
    }
}

/// Inbound HTTP endpoint settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8787)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Upstream account credentials
    pub credentials: Credentials,

    /// Upstream reader API
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Outbound HTTP behaviour
    #[serde(default)]
    pub http: HttpConfig,

    /// Cache windows
    #[serde(default)]
    pub cache: CacheConfig,

    /// Batching and time budget
    #[serde(default)]
    pub batch: BatchConfig,

    /// Article formatting
    #[serde(default)]
    pub format: FormatConfig,

    /// Inbound endpoint
    #[serde(default)]
    pub server: ServerConfig,

    /// Log level used when RUST_LOG is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            upstream: UpstreamConfig::default(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            format: FormatConfig::default(),
            server: ServerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Environment variable names
pub mod env_keys {
    /// Upstream account username
    pub const USERNAME: &str = "READER_USERNAME";
    /// Upstream account password
    pub const PASSWORD: &str = "READER_PASSWORD";
    /// Upstream API base URL
    pub const API_BASE: &str = "READER_API_BASE";
    /// Client identifier header value
    pub const USER_AGENT: &str = "READER_USER_AGENT";
    /// Items requested per subscription
    pub const MAX_ITEMS_PER_FEED: &str = "MAX_ITEMS_PER_FEED";
    /// Per-attempt timeout in milliseconds
    pub const REQUEST_TIMEOUT_MS: &str = "REQUEST_TIMEOUT_MS";
    /// Retries after the first attempt
    pub const MAX_RETRIES: &str = "MAX_RETRIES";
    /// Linear backoff base in milliseconds
    pub const RETRY_BASE_DELAY_MS: &str = "RETRY_BASE_DELAY_MS";
    /// Keep cookies within a run
    pub const COOKIE_STORE: &str = "COOKIE_STORE";
    /// Cache TTL in seconds
    pub const CACHE_TTL_SECS: &str = "CACHE_TTL_SECS";
    /// Cooldown window in seconds
    pub const CACHE_COOLDOWN_SECS: &str = "CACHE_COOLDOWN_SECS";
    /// Subscriptions per group
    pub const BATCH_SIZE: &str = "BATCH_SIZE";
    /// Pause between groups in milliseconds
    pub const BATCH_PAUSE_MS: &str = "BATCH_PAUSE_MS";
    /// Concurrent fetching within a group
    pub const BATCH_CONCURRENT: &str = "BATCH_CONCURRENT";
    /// Soft wall-clock budget in milliseconds
    pub const TIME_BUDGET_MS: &str = "TIME_BUDGET_MS";
    /// Icon base URL
    pub const ICON_BASE_URL: &str = "ICON_BASE_URL";
    /// UTC offset for rendered times, in minutes
    pub const TIME_OFFSET_MINUTES: &str = "TIME_OFFSET_MINUTES";
    /// Listen address
    pub const BIND_ADDRESS: &str = "BIND_ADDRESS";
    /// Comma separated CORS origins
    pub const CORS_ORIGINS: &str = "CORS_ORIGINS";
    /// Default log level
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

impl Config {
    /// Load configuration from process environment variables
    ///
    /// Callers that want `.env` support should run `dotenvy::dotenv()` first.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Missing keys keep their defaults; present but unparseable values are
    /// reported as [`Error::Config`] naming the offending key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        use env_keys::*;

        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Config::default();

        config.credentials = Credentials {
            username: get(USERNAME).unwrap_or_default(),
            password: lookup(PASSWORD).unwrap_or_default(),
        };

        if let Some(v) = get(API_BASE) {
            config.upstream.api_base = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get(USER_AGENT) {
            config.upstream.user_agent = v;
        }
        if let Some(v) = parse_opt::<u32>(&get, MAX_ITEMS_PER_FEED)? {
            config.upstream.max_items_per_feed = v;
        }

        if let Some(v) = parse_opt::<u64>(&get, REQUEST_TIMEOUT_MS)? {
            config.http.request_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parse_opt::<u32>(&get, MAX_RETRIES)? {
            config.http.retry.max_retries = v;
        }
        if let Some(v) = parse_opt::<u64>(&get, RETRY_BASE_DELAY_MS)? {
            config.http.retry.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_bool(&get, COOKIE_STORE)? {
            config.http.cookie_store = v;
        }

        if let Some(v) = parse_opt::<u64>(&get, CACHE_TTL_SECS)? {
            config.cache.ttl = Duration::from_secs(v);
        }
        if let Some(v) = parse_opt::<u64>(&get, CACHE_COOLDOWN_SECS)? {
            config.cache.cooldown = Duration::from_secs(v);
        }

        if let Some(v) = parse_opt::<usize>(&get, BATCH_SIZE)? {
            config.batch.group_size = v;
        }
        if let Some(v) = parse_opt::<u64>(&get, BATCH_PAUSE_MS)? {
            config.batch.pause = Duration::from_millis(v);
        }
        if let Some(v) = parse_bool(&get, BATCH_CONCURRENT)? {
            config.batch.concurrent = v;
        }
        if let Some(v) = parse_opt::<u64>(&get, TIME_BUDGET_MS)? {
            config.batch.time_budget = Duration::from_millis(v);
        }

        if let Some(v) = get(ICON_BASE_URL) {
            config.format.icon_base_url = v;
        }
        if let Some(v) = parse_opt::<i32>(&get, TIME_OFFSET_MINUTES)? {
            config.format.utc_offset_minutes = v;
        }

        if let Some(v) = parse_opt::<SocketAddr>(&get, BIND_ADDRESS)? {
            config.server.bind_address = v;
        }
        if let Some(v) = get(CORS_ORIGINS) {
            config.server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get(LOG_LEVEL) {
            config.log_level = v;
        }

        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        use env_keys::*;

        if self.credentials.username.is_empty() {
            return Err(Error::config(USERNAME, "username is required"));
        }
        if self.credentials.password.is_empty() {
            return Err(Error::config(PASSWORD, "password is required"));
        }

        let base = url::Url::parse(&self.upstream.api_base)
            .map_err(|e| Error::config(API_BASE, format!("invalid URL: {}", e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::config(
                API_BASE,
                format!("unsupported URL scheme: {}", base.scheme()),
            ));
        }

        if self.upstream.max_items_per_feed == 0 {
            return Err(Error::config(MAX_ITEMS_PER_FEED, "must be at least 1"));
        }
        if self.batch.group_size == 0 {
            return Err(Error::config(BATCH_SIZE, "must be at least 1"));
        }
        if self.format.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
            return Err(Error::config(
                TIME_OFFSET_MINUTES,
                "must be within +/- 24 hours",
            ));
        }

        Ok(())
    }
}

fn parse_opt<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::config(key, format!("invalid value '{}': {}", raw, e)))
        })
        .transpose()
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    get(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::config(key, format!("invalid boolean '{}'", raw))),
        })
        .transpose()
}

fn default_api_base() -> String {
    "https://www.inoreader.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; reader-digest)".to_string()
}

fn default_max_items_per_feed() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_request_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_cache_cooldown() -> Duration {
    Duration::from_secs(30)
}

fn default_group_size() -> usize {
    5
}

fn default_batch_pause() -> Duration {
    Duration::from_millis(1000)
}

fn default_time_budget() -> Duration {
    Duration::from_millis(8000)
}

fn default_icon_base_url() -> String {
    "/icons".to_string()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

// Duration serialization helpers
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
