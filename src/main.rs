//! reader-digest server binary
//!
//! Reads configuration from the environment (and a `.env` file when present),
//! then serves the digest until SIGTERM or Ctrl+C.

use reader_digest::{Config, Result, logging};
use tracing::{debug, error, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the process environment still applies
    let dotenv = dotenvy::dotenv();

    let config = Config::from_env()?;
    config.validate()?;
    logging::init(&config.log_level)?;

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to read .env file"),
    }

    reader_digest::run(config).await.inspect_err(|e| {
        error!(error = %e, "Server terminated with error");
    })
}
