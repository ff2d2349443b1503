//! REST API server module
//!
//! Serves the streaming ZIP export next to a health check and the OpenAPI
//! document. Only the export route sits behind authentication.

use crate::engine::TorrentEngine;
use crate::{Config, Result};
use axum::{Router, http::HeaderValue, middleware, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Archive (behind HTTP Basic auth when accounts are configured)
/// - `GET /api/downloadzip?hash=<hex|base32|magnet>` - Stream all files as a ZIP
///
/// ## System
/// - `GET /api/health` - Health check
/// - `GET /api/openapi.json` - OpenAPI specification
pub fn create_router(engine: Arc<dyn TorrentEngine>, config: Arc<Config>) -> Router {
    let state = AppState::new(engine, config.clone());

    let accounts: auth::Accounts = Arc::new(config.api.accounts.clone());
    let authorized = Router::new()
        .route("/api/downloadzip", get(routes::download_zip))
        .layer(middleware::from_fn_with_state(
            accounts,
            auth::require_basic_auth,
        ));

    let router = Router::new()
        .route("/api/health", get(routes::health_check))
        .route("/api/openapi.json", get(routes::openapi_spec))
        .merge(authorized)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// # Arguments
///
/// * `origins` - List of allowed origins (supports "*" for any origin)
///
/// # Returns
///
/// A configured CorsLayer that allows the specified origins, all methods,
/// and all headers for cross-origin requests.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until SIGTERM or SIGINT (Ctrl+C on other platforms), then stops accepting
/// connections and lets in-flight exports finish.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use torrent_export::{Config, MemoryEngine};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Arc::new(MemoryEngine::new());
/// let config = Arc::new(Config::default());
///
/// // Start API server (blocks until shutdown)
/// torrent_export::api::start_api_server(engine, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(engine: Arc<dyn TorrentEngine>, config: Arc<Config>) -> Result<()> {
    start_api_server_with_shutdown(engine, config, crate::wait_for_signal()).await
}

/// Like [`start_api_server`], but stops when `shutdown` resolves.
///
/// # Errors
///
/// - [`crate::Error::Config`] if the configuration does not validate
/// - [`crate::Error::Io`] if the bind address cannot be bound
/// - [`crate::Error::ApiServerError`] if serving fails
pub async fn start_api_server_with_shutdown<F>(
    engine: Arc<dyn TorrentEngine>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    let bind_address = config.api.bind_address;

    tracing::info!(
        address = %bind_address,
        auth = !config.api.accounts.is_empty(),
        "Starting API server"
    );

    let app = create_router(engine, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().map_err(crate::error::Error::Io)?,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
