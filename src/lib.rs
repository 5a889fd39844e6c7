//! # reader-digest
//!
//! Compact per-site digest of the newest articles from a
//! Google-Reader-compatible RSS aggregator, served over HTTP with short-lived
//! in-process caching.
//!
//! ## Pipeline
//!
//! On a cache miss the service logs in with the legacy `ClientLogin` scheme,
//! lists subscriptions, fetches each subscription's recent items in
//! fixed-size groups under a soft time budget, formats them, and merges them
//! into the previous digest (ten newest articles per site). A failed run
//! serves the previous digest when there is one.
//!
//! ## Quick Start
//!
//! ```no_run
//! use reader_digest::{Config, DigestService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!
//!     let service = DigestService::from_config(&config)?;
//!     let response = service.get_digest().await?;
//!
//!     for (site, articles) in response.digest.iter() {
//!         println!("{site}: {} articles ({})", articles.len(), response.source);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP API module
pub mod api;
/// Digest cache
pub mod cache;
/// Configuration types
pub mod config;
/// Digest types and merge policy
pub mod digest;
/// Error types
pub mod error;
/// Article formatting
pub mod format;
/// Outbound HTTP client
pub mod http;
/// Logging initialization
pub mod logging;
/// Digest pipeline orchestration
pub mod pipeline;
/// Upstream reader API
pub mod reader;
/// Retry logic with linear backoff
pub mod retry;

// Re-export commonly used types
pub use config::{Config, Credentials};
pub use digest::{ArticleDigest, FormattedArticle};
pub use error::{ApiError, Error, Result, ToHttpStatus};
pub use pipeline::{DigestResponse, DigestService, DigestSource, RunReport};
pub use reader::{ReaderClient, ReaderSource};

use std::sync::Arc;

/// Build the digest service and serve it until a termination signal arrives.
///
/// # Errors
/// Returns error if the service cannot be built or the server fails
pub async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let service = Arc::new(DigestService::from_config(&config)?);

    api::start_api_server(service, config, wait_for_signal()).await
}

/// Resolve once the process is asked to stop.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

/// Resolve once the process is asked to stop.
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
