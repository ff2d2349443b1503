//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the torrent-export REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the torrent-export REST API
///
/// The spec can be accessed via `/api/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "torrent-export REST API",
        version = "0.1.0",
        description = "Streams the files of a torrent as a single ZIP archive while pieces arrive from the swarm",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8090", description = "Local development server")
    ),
    paths(
        // Archive export
        crate::api::routes::download_zip,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Config types from config.rs
        crate::config::Config,
        crate::config::ApiConfig,
        crate::config::ExportConfig,

        // Engine types
        crate::engine::FileStat,

        // API response types from routes
        crate::api::routes::HealthResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "archive", description = "Archive export - Stream a torrent's files as one ZIP"),
        (name = "system", description = "System endpoints - Health checks and OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add HTTP Basic authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "basic_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Basic,
                    ),
                ),
            );
        }
    }
}
