//! Error types for reader-digest
//!
//! This module provides the error taxonomy shared by the pipeline and the HTTP
//! boundary:
//! - Transport failures talking to the upstream reader API (retried locally)
//! - Run-terminal failures (authentication, empty listing)
//! - HTTP status code mapping and the JSON error body served to callers

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for reader-digest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for reader-digest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The environment key that caused the error (e.g., "BATCH_SIZE")
        key: Option<String>,
    },

    /// Transport-level failure (connect, body read, redirect loop, ...)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A single request attempt exceeded the per-request timeout
    #[error("request timed out: {url}")]
    Timeout {
        /// Request URL with credentials removed
        url: String,
    },

    /// Upstream answered with a non-success status where one was required
    #[error("upstream returned HTTP {status} for {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Request URL with credentials removed
        url: String,
    },

    /// Login did not yield a usable token
    #[error("authentication failed: {reason}")]
    Auth {
        /// Why no token could be obtained
        reason: String,
    },

    /// Subscription listing came back empty, nothing to fetch
    #[error("subscription listing is empty")]
    EmptyListing,

    /// Every subscription attempted in the run failed
    #[error("all {attempted} subscriptions failed to fetch")]
    AllSubscriptionsFailed {
        /// Number of subscriptions that were attempted
        attempted: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error tied to an environment key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this failure ends the current pipeline run
    ///
    /// Terminal failures make the orchestrator fall back to the cached digest
    /// (or surface the error when the cache is cold).
    pub fn is_run_terminal(&self) -> bool {
        matches!(
            self,
            Error::Auth { .. } | Error::EmptyListing | Error::AllSubscriptionsFailed { .. }
        )
    }
}

/// Error body served to callers
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": "auth_failed",
///   "message": "authentication failed: Auth= marker not found in login response"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g., "auth_failed", "upstream_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: code.into(),
            message: message.into(),
        }
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 502 Bad Gateway - upstream reader API misbehaved
            Error::Network(_) => 502,
            Error::HttpStatus { .. } => 502,
            Error::Auth { .. } => 502,
            Error::EmptyListing => 502,
            Error::AllSubscriptionsFailed { .. } => 502,

            // 504 Gateway Timeout
            Error::Timeout { .. } => 504,

            // 500 Internal Server Error
            Error::Config { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Network(_) => "network_error",
            Error::Timeout { .. } => "upstream_timeout",
            Error::HttpStatus { .. } => "upstream_error",
            Error::Auth { .. } => "auth_failed",
            Error::EmptyListing => "empty_listing",
            Error::AllSubscriptionsFailed { .. } => "fetch_failed",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::new(error.error_code(), error.to_string())
    }
}
