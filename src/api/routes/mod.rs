//! Route handlers for the HTTP API
//!
//! Handlers are organized by domain:
//! - [`digest`]: the per-site article digest
//! - [`system`]: health and OpenAPI

mod digest;
mod system;

pub use digest::*;
pub use system::*;
