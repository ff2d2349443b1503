//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`archive`]: streaming ZIP export of a torrent
//! - [`system`]: health and OpenAPI

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

mod archive;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use archive::*;
pub use system::*;

/// Query parameters for GET /api/downloadzip
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadZipQuery {
    /// Torrent reference: 40-char hex hash, 32-char base32 hash, or magnet URI
    pub hash: Option<String>,
}

/// Body of GET /api/health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the server answers
    pub status: String,
    /// Crate version
    pub version: String,
}
