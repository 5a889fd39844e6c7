//! Application state for the API server

use crate::Config;
use crate::pipeline::DigestService;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// Digest service, owner of the cache
    pub service: Arc<DigestService>,

    /// Configuration (read only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<DigestService>, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}
